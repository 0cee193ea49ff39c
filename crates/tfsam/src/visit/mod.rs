//! visitor pattern helpers
mod visit_strings;
pub use visit_strings::{VisitStrings, VisitStringsMut};

/// Visitor that visits its subjects
pub trait Visit<T: ?Sized> {
    fn visit(&mut self, value: &T);
}

/// Visitor that visits its subjects mutably
pub trait VisitMut<T> {
    fn visit_mut(&mut self, value: &mut T);
}

// blanket impl for FnMut
impl<T: ?Sized, F> Visit<T> for F
where
    F: FnMut(&T),
{
    fn visit(&mut self, value: &T) {
        self(value)
    }
}

// blanket impl for FnMut
impl<T, F> VisitMut<T> for F
where
    F: FnMut(&mut T),
{
    fn visit_mut(&mut self, value: &mut T) {
        self(value)
    }
}
