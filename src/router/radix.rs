//! Segment tree for route resolution.
//!
//! Patterns are split into segments and inserted into a tree where each node
//! owns literal children, at most one capture child and at most one catch-all
//! child. Lookup is proportional to path depth rather than route count.
//!
//! ## Resolution order
//!
//! At every level the literal child is tried first, then the capture child,
//! then the catch-all child. A branch that fails to produce a handler for the
//! request method is backtracked, so the most specific pattern wins and
//! registration order never changes the outcome for non-overlapping patterns.
//!
//! A terminal node holds the method bindings for one pattern shape. Those
//! bindings double as the method-set index used for `405 Method Not Allowed`.
//! When no binding matches the method, the search has visited every pattern
//! matching the path, and the allowed set is the union of their methods.

use http::Method;
use smallvec::SmallVec;
use std::sync::Arc;

use super::core::{ParamVec, MAX_INLINE_PARAMS};
use super::pattern::{split_path, Pattern, RouteError, Segment};

/// A method binding stored at a terminal node.
#[derive(Debug, Clone)]
pub struct Endpoint<T> {
    pub pattern: Arc<str>,
    pub names: Arc<[Arc<str>]>,
    pub value: T,
}

/// Result of resolving a (method, path) pair.
#[derive(Debug)]
pub enum Lookup<'a, T> {
    /// A binding for the method matched; `params` holds the captured values.
    Matched {
        endpoint: &'a Endpoint<T>,
        params: ParamVec,
    },
    /// The path matched at least one pattern, but none bound to this method.
    /// `allowed` is sorted alphabetically.
    PathExists { allowed: Vec<Method> },
    NoMatch,
}

#[derive(Debug, Clone)]
struct RadixNode<T> {
    children: Vec<(String, RadixNode<T>)>,
    capture: Option<Box<RadixNode<T>>>,
    catch_all: Option<Box<RadixNode<T>>>,
    /// Method bindings in registration order.
    routes: Vec<(Method, Endpoint<T>)>,
}

type Captures<'p> = SmallVec<[CaptureValue<'p>; MAX_INLINE_PARAMS]>;

#[derive(Debug, Clone, Copy)]
enum CaptureValue<'p> {
    One(&'p str),
    Rest(&'p [&'p str]),
}

impl<T> RadixNode<T> {
    fn new() -> Self {
        Self {
            children: Vec::new(),
            capture: None,
            catch_all: None,
            routes: Vec::new(),
        }
    }

    fn insert(
        &mut self,
        segments: &[Segment],
        method: Method,
        endpoint: Endpoint<T>,
    ) -> Result<(), RouteError> {
        let Some((segment, remaining)) = segments.split_first() else {
            if self.routes.iter().any(|(m, _)| *m == method) {
                return Err(RouteError::DuplicateRoute {
                    method,
                    pattern: endpoint.pattern.to_string(),
                });
            }
            self.routes.push((method, endpoint));
            return Ok(());
        };

        let child = match segment {
            Segment::Literal(lit) => {
                let idx = match self.children.iter().position(|(s, _)| s == lit) {
                    Some(idx) => idx,
                    None => {
                        self.children.push((lit.clone(), RadixNode::new()));
                        self.children.len() - 1
                    }
                };
                &mut self.children[idx].1
            }
            Segment::Capture(_) => self
                .capture
                .get_or_insert_with(|| Box::new(RadixNode::new()))
                .as_mut(),
            Segment::CatchAll(_) => self
                .catch_all
                .get_or_insert_with(|| Box::new(RadixNode::new()))
                .as_mut(),
        };
        child.insert(remaining, method, endpoint)
    }

    fn binding(&self, method: &Method) -> Option<&Endpoint<T>> {
        self.routes
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, e)| e)
    }

    /// Depth-first search with backtracking. `allowed` collects the methods of
    /// every terminal node reached whose pattern matched but whose methods did not.
    fn search<'n, 'p>(
        &'n self,
        segments: &'p [&'p str],
        method: &Method,
        captures: &mut Captures<'p>,
        allowed: &mut Vec<Method>,
    ) -> Option<&'n Endpoint<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            if let Some(found) = self.terminal(method, allowed) {
                return Some(found);
            }
            // A catch-all may bind zero remaining segments.
            if let Some(catch_all) = &self.catch_all {
                captures.push(CaptureValue::Rest(&[]));
                if let Some(found) = catch_all.terminal(method, allowed) {
                    return Some(found);
                }
                captures.pop();
            }
            return None;
        };

        if let Some((_, child)) = self.children.iter().find(|(s, _)| s == segment) {
            if let Some(found) = child.search(remaining, method, captures, allowed) {
                return Some(found);
            }
        }

        if let Some(capture) = &self.capture {
            captures.push(CaptureValue::One(*segment));
            if let Some(found) = capture.search(remaining, method, captures, allowed) {
                return Some(found);
            }
            captures.pop();
        }

        if let Some(catch_all) = &self.catch_all {
            captures.push(CaptureValue::Rest(segments));
            if let Some(found) = catch_all.terminal(method, allowed) {
                return Some(found);
            }
            captures.pop();
        }

        None
    }

    fn terminal(
        &self,
        method: &Method,
        allowed: &mut Vec<Method>,
    ) -> Option<&Endpoint<T>> {
        if self.routes.is_empty() {
            return None;
        }
        match self.binding(method) {
            Some(endpoint) => Some(endpoint),
            None => {
                for (m, _) in &self.routes {
                    if !allowed.contains(m) {
                        allowed.push(m.clone());
                    }
                }
                None
            }
        }
    }

    fn for_each_value_mut(&mut self, f: &mut dyn FnMut(&mut T)) {
        for (_, endpoint) in &mut self.routes {
            f(&mut endpoint.value);
        }
        for (_, child) in &mut self.children {
            child.for_each_value_mut(f);
        }
        if let Some(capture) = &mut self.capture {
            capture.for_each_value_mut(f);
        }
        if let Some(catch_all) = &mut self.catch_all {
            catch_all.for_each_value_mut(f);
        }
    }

    fn collect<'n>(&'n self, out: &mut Vec<(&'n Method, &'n Endpoint<T>)>) {
        out.extend(self.routes.iter().map(|(m, e)| (m, e)));
        for (_, child) in &self.children {
            child.collect(out);
        }
        if let Some(capture) = &self.capture {
            capture.collect(out);
        }
        if let Some(catch_all) = &self.catch_all {
            catch_all.collect(out);
        }
    }
}

/// Route table keyed by (method, pattern shape).
#[derive(Debug, Clone)]
pub struct RadixTree<T> {
    root: RadixNode<T>,
    len: usize,
}

impl<T> Default for RadixTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RadixTree<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: RadixNode::new(),
            len: 0,
        }
    }

    /// Bind `value` to (method, pattern). Fails on an exact duplicate.
    pub fn insert(
        &mut self,
        method: Method,
        pattern: &Pattern,
        value: T,
    ) -> Result<(), RouteError> {
        let endpoint = Endpoint {
            pattern: Arc::from(pattern.as_str()),
            names: pattern.param_names().cloned().collect(),
            value,
        };
        self.root.insert(pattern.segments(), method, endpoint)?;
        self.len += 1;
        Ok(())
    }

    /// Number of (method, pattern) bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<'_, T> {
        let segments: SmallVec<[&str; 16]> = split_path(path).collect();
        let mut captures = Captures::new();
        let mut allowed = Vec::new();

        match self.root.search(&segments, method, &mut captures, &mut allowed) {
            Some(endpoint) => {
                let params = endpoint
                    .names
                    .iter()
                    .zip(captures.iter())
                    .map(|(name, value)| {
                        let value = match value {
                            CaptureValue::One(s) => (*s).to_string(),
                            CaptureValue::Rest(rest) => rest.join("/"),
                        };
                        (Arc::clone(name), value)
                    })
                    .collect();
                Lookup::Matched { endpoint, params }
            }
            None if allowed.is_empty() => Lookup::NoMatch,
            None => {
                allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                Lookup::PathExists { allowed }
            }
        }
    }

    /// Apply `f` to every bound value in place.
    pub fn for_each_value_mut(&mut self, mut f: impl FnMut(&mut T)) {
        self.root.for_each_value_mut(&mut f);
    }

    /// Every binding, depth-first with literal children before wildcards.
    pub fn entries(&self) -> Vec<(&Method, &Endpoint<T>)> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut out);
        out
    }
}
