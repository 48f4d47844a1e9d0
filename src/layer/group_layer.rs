use uuid::Uuid;

use super::LayerDelegate;

/// A layer that orders other layers.
///
/// Children are referenced by id; the nodes themselves live in the owning
/// [`LayerTree`](super::LayerTree), which is the only code that edits the
/// child list.
#[derive(Debug)]
pub struct GroupLayer {
    delegate: LayerDelegate,
    pub(crate) children: Vec<Uuid>,
}

impl GroupLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            delegate: LayerDelegate::new(name),
            children: Vec::new(),
        }
    }

    #[inline] pub fn delegate(&self) -> &LayerDelegate { &self.delegate }
    #[inline] pub fn delegate_mut(&mut self) -> &mut LayerDelegate { &mut self.delegate }

    /// Ids of the immediate children, first to last.
    #[inline]
    pub fn children(&self) -> &[Uuid] {
        &self.children
    }

    /// Number of immediate children.
    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn duplicate_empty(&self) -> Self {
        Self {
            delegate: self.delegate.duplicate(),
            children: Vec::new(),
        }
    }
}
