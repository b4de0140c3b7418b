/// A non-blocking byte source the router drains.
///
/// Both operations must return immediately. `available` reports how many
/// bytes are currently buffered; `read` copies up to `dst.len()` of them and
/// returns the count actually copied. A return of zero from either call
/// means "nothing right now", never "end of stream" — serial-like links
/// have no EOF.
pub trait Transport: Send {
    /// Number of bytes currently buffered and readable without blocking.
    fn available(&mut self) -> usize;

    /// Copy up to `dst.len()` buffered bytes into `dst`; returns the count copied.
    fn read(&mut self, dst: &mut [u8]) -> usize;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn available(&mut self) -> usize {
        (**self).available()
    }

    fn read(&mut self, dst: &mut [u8]) -> usize {
        (**self).read(dst)
    }
}
