//! Lazy sequence combinators.
//!
//! A small algebra of pull-based iterator adapters the store composes every
//! lazy query variant from: enumerate a collection, filter by predicate,
//! concatenate sequences, transform elements. Nothing is materialized and
//! nothing is computed ahead of what the consumer has pulled; dropping an
//! iterator is cancellation.

/// Lazily enumerate every value of a collection, in its own order.
pub fn yield_all<C>(collection: C) -> C::IntoIter
where
    C: IntoIterator,
{
    collection.into_iter()
}

/// Re-yields only upstream elements satisfying `predicate`, preserving
/// order, suspending between matches.
pub struct Matching<I, P> {
    upstream: I,
    predicate: P,
}

pub fn matching<I, P>(upstream: I, predicate: P) -> Matching<I::IntoIter, P>
where
    I: IntoIterator,
    P: FnMut(&I::Item) -> bool,
{
    Matching {
        upstream: upstream.into_iter(),
        predicate,
    }
}

impl<I, P> Iterator for Matching<I, P>
where
    I: Iterator,
    P: FnMut(&I::Item) -> bool,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        for item in self.upstream.by_ref() {
            if (self.predicate)(&item) {
                return Some(item);
            }
        }
        None
    }
}

/// Concatenates a sequence of like-typed iterators, exhausting each in turn
/// (never interleaved).
pub struct Union<I> {
    sources: std::vec::IntoIter<I>,
    current: Option<I>,
}

pub fn union<I>(sources: Vec<I>) -> Union<I>
where
    I: Iterator,
{
    Union {
        sources: sources.into_iter(),
        current: None,
    }
}

impl<I> Iterator for Union<I>
where
    I: Iterator,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        loop {
            if let Some(current) = &mut self.current {
                if let Some(item) = current.next() {
                    return Some(item);
                }
            }
            self.current = Some(self.sources.next()?);
        }
    }
}

/// Transforms each upstream element through a pure function, one element per
/// pull.
pub struct Mapped<I, F> {
    upstream: I,
    transform: F,
}

pub fn mapped<I, F, B>(upstream: I, transform: F) -> Mapped<I::IntoIter, F>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> B,
{
    Mapped {
        upstream: upstream.into_iter(),
        transform,
    }
}

impl<I, F, B> Iterator for Mapped<I, F>
where
    I: Iterator,
    F: FnMut(I::Item) -> B,
{
    type Item = B;

    fn next(&mut self) -> Option<B> {
        self.upstream.next().map(&mut self.transform)
    }
}
