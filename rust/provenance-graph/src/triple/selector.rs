use crate::{Identifier, Triple};

#[cfg(doc)]
use crate::Graph;

/// The basic query system for selecting [`Triple`]s from a [`Graph`]. You
/// can assign its fields directly, but for convenience it is also possible to
/// construct it incrementally with the `subject`, `predicate` and `object`
/// methods.
///
/// When a field is specified, all [`Triple`]s that are selected will share
/// the same field value. A field left as `None` is a wildcard.
///
/// Note that when all fields are `None` every [`Triple`] in the graph is
/// selected, which means a full scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleSelector {
    /// The subject that selected [`Triple`]s should have
    pub subject: Option<Identifier>,
    /// The predicate that selected [`Triple`]s should have
    pub predicate: Option<Identifier>,
    /// The object that selected [`Triple`]s should have
    pub object: Option<Identifier>,
}

impl TripleSelector {
    /// Bind the subject position
    pub fn subject(mut self, subject: Identifier) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Bind the predicate position
    pub fn predicate(mut self, predicate: Identifier) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Bind the object position
    pub fn object(mut self, object: Identifier) -> Self {
        self.object = Some(object);
        self
    }

    /// True when no position is bound
    pub fn is_unbound(&self) -> bool {
        self.subject.is_none() && self.predicate.is_none() && self.object.is_none()
    }

    /// Whether a [`Triple`] agrees with every bound position
    pub fn matches(&self, triple: &Triple) -> bool {
        self.subject.as_ref().is_none_or(|s| *s == triple.subject)
            && self.predicate.as_ref().is_none_or(|p| *p == triple.predicate)
            && self.object.as_ref().is_none_or(|o| *o == triple.object)
    }

    /// The fully bound [`Triple`], if all three positions are bound
    pub fn as_triple(&self) -> Option<Triple> {
        match (&self.subject, &self.predicate, &self.object) {
            (Some(subject), Some(predicate), Some(object)) => Some(Triple::new(
                subject.clone(),
                predicate.clone(),
                object.clone(),
            )),
            _ => None,
        }
    }
}

impl From<&Triple> for TripleSelector {
    fn from(value: &Triple) -> Self {
        TripleSelector {
            subject: Some(value.subject.clone()),
            predicate: Some(value.predicate.clone()),
            object: Some(value.object.clone()),
        }
    }
}
