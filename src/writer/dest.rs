//! Uniform ownership of a layer's destination.
//!
//! Every composed writer is generic over how it holds its destination:
//! by value ([`Owned`]), by exclusive borrow ([`Borrowed`]), or boxed
//! (`Box<W>`, including `Box<dyn Writer>` when the sink is chosen at
//! runtime). `Close()` on a layer cascades to the destination iff
//! [`Dest::is_owning`] is true.

use crate::writer::Writer;

/// Holds a layer's destination writer.
pub trait Dest {
    type Target: Writer + ?Sized;

    fn get(&self) -> &Self::Target;

    fn get_mut(&mut self) -> &mut Self::Target;

    /// True iff this holder owns the target's lifetime, in which case the
    /// layer closes the destination when it closes itself.
    fn is_owning(&self) -> bool;
}

/// Destination held by value; the layer owns it.
#[derive(Debug)]
pub struct Owned<W>(pub W);

impl<W> Owned<W> {
    /// Releases the destination, e.g. to collect an in-memory sink's bytes
    /// after the layer is closed.
    pub fn into_inner(self) -> W {
        self.0
    }
}

impl<W: Writer> Dest for Owned<W> {
    type Target = W;

    fn get(&self) -> &W {
        &self.0
    }

    fn get_mut(&mut self) -> &mut W {
        &mut self.0
    }

    fn is_owning(&self) -> bool {
        true
    }
}

/// Destination borrowed for the lifetime of the layer; the caller keeps
/// ownership and the layer never closes it.
#[derive(Debug)]
pub struct Borrowed<'a, W>(pub &'a mut W);

impl<'a, W: Writer> Dest for Borrowed<'a, W> {
    type Target = W;

    fn get(&self) -> &W {
        self.0
    }

    fn get_mut(&mut self) -> &mut W {
        self.0
    }

    fn is_owning(&self) -> bool {
        false
    }
}

impl<W: Writer + ?Sized> Dest for Box<W> {
    type Target = W;

    fn get(&self) -> &W {
        self
    }

    fn get_mut(&mut self) -> &mut W {
        self
    }

    fn is_owning(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::vec::VecWriter;

    #[test]
    fn ownership_shapes() {
        let owned = Owned(VecWriter::new());
        assert!(owned.is_owning());

        let mut writer = VecWriter::new();
        let borrowed = Borrowed(&mut writer);
        assert!(!borrowed.is_owning());

        let boxed: Box<dyn Writer> = Box::new(VecWriter::new());
        assert!(boxed.is_owning());
    }
}
