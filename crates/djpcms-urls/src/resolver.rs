//! Recursive path resolution.
//!
//! A [`Resolver`] owns a route and an ordered list of candidates, each a
//! route bound either to a view or to a nested resolver. Resolution tries
//! the candidates in order. A nested resolver is entered with the part of
//! the path its route left over and the variables captured so far; a view
//! only counts when nothing is left over.
//!
//! When nothing matches, the entry resolver consults its flat-page lookup
//! and, failing that, reports [`Error::NotFound`] with a redirect hint if
//! the same path with a trailing slash would have resolved.

use std::fmt;
use std::sync::Arc;

use djpcms_core::{Error, Result};

use crate::route::{Route, UrlArgs};

/// Finds views for stored pages by their exact URL.
pub trait FlatPageLookup<V>: Send + Sync {
	/// The view serving `url`, if a page is stored there.
	fn lookup(&self, url: &str) -> Result<Option<V>>;
}

/// What a candidate route leads to.
pub enum Target<V> {
	/// A terminal view.
	View(V),
	/// A nested resolver.
	Resolver(Arc<Resolver<V>>),
}

impl<V: Clone> Clone for Target<V> {
	fn clone(&self) -> Self {
		match self {
			Self::View(v) => Self::View(v.clone()),
			Self::Resolver(r) => Self::Resolver(Arc::clone(r)),
		}
	}
}

/// A route bound to a [`Target`].
pub struct Candidate<V> {
	route: Route,
	target: Target<V>,
}

impl<V> Candidate<V> {
	/// Binds `route` to a view.
	pub fn view(route: Route, view: V) -> Self {
		Self {
			route,
			target: Target::View(view),
		}
	}

	/// Mounts a nested resolver at its own route.
	pub fn resolver(resolver: Arc<Resolver<V>>) -> Self {
		Self {
			route: resolver.route.clone(),
			target: Target::Resolver(resolver),
		}
	}

	/// The candidate route.
	pub fn route(&self) -> &Route {
		&self.route
	}

	/// The candidate target.
	pub fn target(&self) -> &Target<V> {
		&self.target
	}
}

/// Order in which candidates are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrder {
	/// As given.
	Registration,
	/// Reverse lexicographic order of the candidate rules, so `blog/archive/`
	/// is tried before `blog/`. Candidates with equal rules keep their
	/// relative order.
	SpecificFirst,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverMatch<V> {
	/// The resolved view.
	pub target: V,
	/// Variables captured along the way.
	pub kwargs: UrlArgs,
	/// The absolute path that resolved.
	pub path: String,
}

/// An immutable resolver.
pub struct Resolver<V> {
	route: Route,
	candidates: Vec<Candidate<V>>,
	flat_pages: Option<Arc<dyn FlatPageLookup<V>>>,
}

impl<V> fmt::Debug for Resolver<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let rules: Vec<&str> = self.candidates.iter().map(|c| c.route.rule()).collect();
		f.debug_struct("Resolver")
			.field("route", &self.route.rule())
			.field("candidates", &rules)
			.field("flat_pages", &self.flat_pages.is_some())
			.finish()
	}
}

impl<V: Clone> Resolver<V> {
	/// Builds a resolver.
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_urls::resolver::{Candidate, CandidateOrder, Resolver};
	/// use djpcms_urls::route::Route;
	///
	/// let resolver = Resolver::new(
	///     Route::root(),
	///     vec![
	///         Candidate::view(Route::new("blog/").unwrap(), "blog"),
	///         Candidate::view(Route::new("blog/archive/").unwrap(), "archive"),
	///     ],
	///     CandidateOrder::SpecificFirst,
	/// );
	/// assert_eq!(resolver.resolve("/blog/archive/").unwrap().target, "archive");
	/// ```
	pub fn new(route: Route, mut candidates: Vec<Candidate<V>>, order: CandidateOrder) -> Self {
		if order == CandidateOrder::SpecificFirst {
			candidates.sort_by(|a, b| b.route.rule().cmp(a.route.rule()));
		}
		Self {
			route,
			candidates,
			flat_pages: None,
		}
	}

	/// Sets the flat-page lookup consulted when no candidate matches.
	pub fn with_flat_pages(mut self, lookup: Arc<dyn FlatPageLookup<V>>) -> Self {
		self.flat_pages = Some(lookup);
		self
	}

	/// The resolver's own route.
	pub fn route(&self) -> &Route {
		&self.route
	}

	/// Candidates in the order they are tried.
	pub fn candidates(&self) -> &[Candidate<V>] {
		&self.candidates
	}

	/// Resolves an absolute path.
	///
	/// # Errors
	///
	/// [`Error::NotFound`] on a miss, with `redirect` set to the path plus a
	/// trailing slash when that path resolves. Flat-page lookup errors
	/// propagate.
	pub fn resolve(&self, path: &str) -> Result<ResolverMatch<V>> {
		self.resolve_entry(path, true)
	}

	fn resolve_entry(&self, path: &str, hint: bool) -> Result<ResolverMatch<V>> {
		let relative = path.trim_start_matches('/');
		let (vars, full_path) = match self.route.match_path(relative) {
			Some(own) => {
				let rest = own.remainder.unwrap_or_default();
				if let Some((target, kwargs)) = self.resolve_from(&rest, &own.vars) {
					return Ok(ResolverMatch {
						target,
						kwargs,
						path: format!("/{relative}"),
					});
				}
				(own.vars, format!("{}{rest}", self.route.path()))
			}
			None => (UrlArgs::new(), format!("/{relative}")),
		};

		if let Some(lookup) = &self.flat_pages
			&& let Some(view) = lookup.lookup(&full_path)?
		{
			tracing::debug!(path = %full_path, "resolved flat page");
			return Ok(ResolverMatch {
				target: view,
				kwargs: vars,
				path: full_path,
			});
		}

		let redirect = if hint && !full_path.ends_with('/') {
			let candidate = format!("{full_path}/");
			self.resolve_entry(&candidate, false).ok().map(|_| candidate)
		} else {
			None
		};
		tracing::debug!(path = %full_path, redirect = ?redirect, "no route matched");
		Err(Error::NotFound {
			path: full_path,
			redirect,
		})
	}

	/// Resolves `path` relative to this resolver's route, starting from
	/// already captured `vars`.
	pub fn resolve_from(&self, path: &str, vars: &UrlArgs) -> Option<(V, UrlArgs)> {
		for candidate in &self.candidates {
			let Some(found) = candidate.route.match_path(path) else {
				continue;
			};
			let mut merged = vars.clone();
			for (name, value) in found.vars {
				if merged.contains_key(&name) {
					tracing::debug!(
						variable = %name,
						rule = %candidate.route.rule(),
						"keeping earlier captured value"
					);
					continue;
				}
				merged.insert(name, value);
			}
			match &candidate.target {
				Target::View(view) => {
					if found.remainder.as_deref().is_none_or(str::is_empty) {
						return Some((view.clone(), merged));
					}
				}
				Target::Resolver(nested) => {
					let rest = found.remainder.unwrap_or_default();
					if let Some(hit) = nested.resolve_from(&rest, &merged) {
						return Some(hit);
					}
				}
			}
		}
		None
	}
}
