//! SP-005: Depth-accounted recursive resolution of a value tree.
//!
//! Walks the tree pre-order, offering every node (leaf or composite) to a
//! caller-supplied [`Resolve`] implementation. A handled replacement is itself
//! resolved again, so one indirection can unfold into another. Every recursive
//! step, structural or re-entrant, consumes one unit of the same depth budget.

use super::value::{Mapping, Value};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

/// Resolution settings shared by one top-level call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    /// Maximum recursion depth. Zero or negative means unlimited.
    pub max_depth: i64,
}

impl Context {
    pub fn with_max_depth(max_depth: i64) -> Self {
        Self { max_depth }
    }

    /// Positive depth cap, if any.
    pub fn depth_limit(&self) -> Option<u64> {
        u64::try_from(self.max_depth).ok().filter(|&d| d > 0)
    }

    fn exceeded(&self, depth: u64) -> bool {
        self.depth_limit().is_some_and(|limit| depth > limit)
    }
}

/// A pluggable resolution capability.
///
/// Returns `Ok(Some(replacement))` when it handled the value, `Ok(None)` to
/// leave it to structural recursion, or an error that aborts the whole walk.
pub trait Resolve {
    type Error;

    fn resolve(&self, ctx: &Context, value: &Value) -> Result<Option<Value>, Self::Error>;
}

impl<R: Resolve + ?Sized> Resolve for &R {
    type Error = R::Error;

    fn resolve(&self, ctx: &Context, value: &Value) -> Result<Option<Value>, Self::Error> {
        (**self).resolve(ctx, value)
    }
}

impl<R: Resolve + ?Sized> Resolve for Box<R> {
    type Error = R::Error;

    fn resolve(&self, ctx: &Context, value: &Value) -> Result<Option<Value>, Self::Error> {
        (**self).resolve(ctx, value)
    }
}

/// Composite resolver: tries members in order, returning the first handled
/// replacement or the first error.
pub struct Chain<E> {
    members: Vec<Box<dyn Resolve<Error = E>>>,
}

impl<E> Default for Chain<E> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
        }
    }
}

impl<E> Chain<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member; builder style.
    pub fn with<R>(mut self, resolver: R) -> Self
    where
        R: Resolve<Error = E> + 'static,
    {
        self.members.push(Box::new(resolver));
        self
    }

    pub fn push<R>(&mut self, resolver: R)
    where
        R: Resolve<Error = E> + 'static,
    {
        self.members.push(Box::new(resolver));
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<E> Resolve for Chain<E> {
    type Error = E;

    fn resolve(&self, ctx: &Context, value: &Value) -> Result<Option<Value>, E> {
        for member in &self.members {
            if let Some(out) = member.resolve(ctx, value)? {
                return Ok(Some(out));
            }
        }
        Ok(None)
    }
}

/// Resolve a whole tree. The input is never mutated; the result is a freshly
/// built tree. Errors from the resolver are returned unchanged.
pub fn resolve_all<R>(ctx: &Context, value: &Value, resolver: Option<&R>) -> Result<Value, R::Error>
where
    R: Resolve + ?Sized,
{
    walk(ctx, value, resolver, 0)
}

/// Structural deep copy: [`resolve_all`] with no resolver.
pub fn rebuild(ctx: &Context, value: &Value) -> Value {
    match resolve_all::<Chain<Infallible>>(ctx, value, None) {
        Ok(v) => v,
        Err(never) => match never {},
    }
}

fn walk<R>(ctx: &Context, value: &Value, resolver: Option<&R>, depth: u64) -> Result<Value, R::Error>
where
    R: Resolve + ?Sized,
{
    if ctx.exceeded(depth) {
        tracing::trace!(depth, max_depth = ctx.max_depth, "depth budget exhausted; branch left as is");
        return Ok(value.clone());
    }

    if let Some(r) = resolver {
        if let Some(replacement) = r.resolve(ctx, value)? {
            tracing::debug!(depth, kind = replacement.type_name(), "re-resolving replacement");
            return walk(ctx, &replacement, resolver, depth + 1);
        }
    }

    match value {
        Value::Mapping(map) => {
            let mut out = Mapping::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), walk(ctx, v, resolver, depth + 1)?);
            }
            Ok(Value::Mapping(out))
        }
        Value::List(items) => items
            .iter()
            .map(|item| walk(ctx, item, resolver, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::String(_) => Ok(value.clone()),
    }
}
