//! Ordered, two-tier route table.
//!
//! Literal routes are tried first, then pattern routes, each in registration
//! order. The first route whose method and path match wins.

use std::{fmt, future::Future, ops::Index};

use anyhow::Result;
use http::Method;
use regex_lite::Regex;

use crate::http::{Request, Response};

/// Capture groups extracted by a pattern route, in group order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(Vec<String>);

impl Params {
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<usize> for Params {
    type Output = str;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.0[idx]
    }
}

#[async_trait::async_trait]
pub trait Handler<S>: Send + Sync {
    async fn call(&self, request: Request, params: Params, state: S) -> Result<Response>;
}

#[async_trait::async_trait]
impl<S, F, Fut> Handler<S> for F
where
    S: Send + 'static,
    F: Fn(Request, Params, S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    async fn call(&self, request: Request, params: Params, state: S) -> Result<Response> {
        (self)(request, params, state).await
    }
}

pub enum Route<S> {
    Literal {
        method: Method,
        path: String,
        handler: Box<dyn Handler<S>>,
    },
    Pattern {
        method: Method,
        pattern: Regex,
        handler: Box<dyn Handler<S>>,
    },
}

impl<S> fmt::Debug for Route<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Literal { method, path, .. } => write!(f, "{method} {path}"),
            Route::Pattern { method, pattern, .. } => write!(f, "{method} ~{}", pattern.as_str()),
        }
    }
}

pub struct Router<S> {
    routes: Vec<Route<S>>,
}

impl<S> fmt::Debug for Router<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.routes).finish()
    }
}

impl<S> Default for Router<S> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<S> Router<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route matched by exact, case-sensitive method and path.
    pub fn literal(
        mut self,
        method: Method,
        path: impl Into<String>,
        handler: impl Handler<S> + 'static,
    ) -> Self {
        self.routes.push(Route::Literal {
            method,
            path: path.into(),
            handler: Box::new(handler),
        });
        self
    }

    /// Registers a route matched by a regular expression over the request target.
    /// Anchoring is up to the pattern itself.
    pub fn pattern(
        mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler<S> + 'static,
    ) -> Result<Self, regex_lite::Error> {
        self.routes.push(Route::Pattern {
            method,
            pattern: Regex::new(pattern)?,
            handler: Box::new(handler),
        });
        Ok(self)
    }

    /// Finds the handler for a request, or `None` when no route matches.
    /// `path` is the raw target, so a query string takes part in matching.
    pub fn find(&self, method: &Method, path: &str) -> Option<(&dyn Handler<S>, Params)> {
        let literal = self.routes.iter().find_map(|route| match route {
            Route::Literal {
                method: m,
                path: p,
                handler,
            } if m == method && p == path => Some((handler.as_ref(), Params::default())),
            _ => None,
        });

        literal.or_else(|| {
            self.routes.iter().find_map(|route| match route {
                Route::Pattern {
                    method: m,
                    pattern,
                    handler,
                } if m == method => {
                    let captures = pattern.captures(path)?;
                    if captures.get(0)?.as_str().is_empty() {
                        return None;
                    }

                    let params = captures
                        .iter()
                        .skip(1)
                        .map(|group| group.map(|g| g.as_str().to_owned()).unwrap_or_default())
                        .collect();
                    Some((handler.as_ref(), Params(params)))
                }
                _ => None,
            })
        })
    }
}
