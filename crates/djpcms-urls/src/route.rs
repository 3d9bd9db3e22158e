//! Compiled route rules.
//!
//! A rule is literal text interleaved with variables written `<name>`,
//! `<converter:name>` or `<converter(args):name>`. Rules never start with a
//! slash. A rule ending in `/` is a *non-leaf* route: it matches a path
//! prefix and hands the rest to whatever is mounted below it. Any other rule
//! is a *leaf* and must match the whole remaining path.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use djpcms_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::converters::{Converter, ConverterRegistry, DEFAULT_CONVERTERS, PathValue};

/// Variables extracted from, or used to build, a URL.
pub type UrlArgs = BTreeMap<String, PathValue>;

/// Capture group holding the unmatched tail of a non-leaf route.
const REMAINING: &str = "__remaining__";

/// Maximum allowed size for a compiled route regex (in bytes).
const MAX_ROUTE_REGEX_SIZE: usize = 1 << 20;

static RULE_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(
		r"(?P<static>[^<]*)<(?:(?P<converter>[a-zA-Z_][a-zA-Z0-9_]*)(?:\((?P<args>.*?)\))?:)?(?P<variable>[a-zA-Z_][a-zA-Z0-9_]*)>",
	)
	.expect("rule grammar is a valid regex")
});

static ROOT: Lazy<Route> = Lazy::new(|| Route::new("").expect("the empty rule compiles"));

#[derive(Debug, Clone)]
enum RulePart {
	Static(String),
	Variable {
		name: String,
		converter: Arc<dyn Converter>,
	},
}

/// One `/`-separated segment of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
	/// Whether the segment contains a variable.
	pub is_dynamic: bool,
	/// The variable name for dynamic segments, the literal text otherwise.
	pub name: String,
}

/// Result of a successful [`Route::match_path`].
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
	/// Converted variables, defaults included.
	pub vars: UrlArgs,
	/// Unconsumed path. Always `None` for leaf routes.
	pub remainder: Option<String>,
}

/// An immutable, compiled route rule.
#[derive(Debug, Clone)]
pub struct Route {
	rule: String,
	parts: Vec<RulePart>,
	regex: Regex,
	breadcrumbs: Vec<Breadcrumb>,
	defaults: UrlArgs,
	is_leaf: bool,
}

impl PartialEq for Route {
	fn eq(&self, other: &Self) -> bool {
		self.rule == other.rule && self.defaults == other.defaults
	}
}

impl fmt::Display for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "/{}", self.rule)
	}
}

/// Strips leading slashes and collapses repeated ones.
fn normalize_rule(rule: &str) -> String {
	let mut out = String::with_capacity(rule.len());
	for c in rule.trim_start_matches('/').chars() {
		if c == '/' && out.ends_with('/') {
			continue;
		}
		out.push(c);
	}
	out
}

fn parse_rule(rule: &str, converters: &ConverterRegistry) -> Result<Vec<RulePart>> {
	let mut parts = Vec::new();
	let mut pos = 0;
	while pos < rule.len() {
		let Some(caps) = RULE_RE.captures_at(rule, pos) else {
			break;
		};
		let whole = caps.get(0).map_or(0..0, |m| m.range());
		if whole.start != pos {
			break;
		}
		if let Some(text) = caps.name("static")
			&& !text.as_str().is_empty()
		{
			parts.push(RulePart::Static(text.as_str().to_string()));
		}
		let name = caps
			.name("variable")
			.map(|m| m.as_str().to_string())
			.unwrap_or_default();
		let converter_name = caps.name("converter").map_or("default", |m| m.as_str());
		let converter = converters.build(converter_name, caps.name("args").map(|m| m.as_str()))?;
		parts.push(RulePart::Variable { name, converter });
		pos = whole.end;
	}
	let tail = &rule[pos..];
	if tail.contains('<') || tail.contains('>') {
		return Err(Error::ImproperlyConfigured(format!(
			"malformed variable in route rule '{rule}' near '{tail}'"
		)));
	}
	if !tail.is_empty() {
		parts.push(RulePart::Static(tail.to_string()));
	}
	Ok(parts)
}

fn check_variables(rule: &str, parts: &[RulePart]) -> Result<()> {
	let mut seen: Vec<&str> = Vec::new();
	for part in parts {
		if let RulePart::Variable { name, .. } = part {
			if name == REMAINING {
				return Err(Error::ImproperlyConfigured(format!(
					"route rule '{rule}' uses the reserved variable name '{REMAINING}'"
				)));
			}
			if seen.contains(&name.as_str()) {
				return Err(Error::ImproperlyConfigured(format!(
					"variable '{name}' appears more than once in route rule '{rule}'"
				)));
			}
			seen.push(name.as_str());
		}
	}
	Ok(())
}

fn compile(rule: &str, parts: &[RulePart], is_leaf: bool) -> Result<Regex> {
	let mut pattern = String::from("^");
	for part in parts {
		match part {
			RulePart::Static(text) => pattern.push_str(&regex::escape(text)),
			RulePart::Variable { name, converter } => {
				pattern.push_str(&format!("(?P<{name}>{})", converter.regex()));
			}
		}
	}
	if !is_leaf {
		pattern.push_str(&format!("(?P<{REMAINING}>.*)"));
	}
	pattern.push('$');
	RegexBuilder::new(&pattern)
		.size_limit(MAX_ROUTE_REGEX_SIZE)
		.build()
		.map_err(|e| Error::ImproperlyConfigured(format!("route rule '{rule}' does not compile: {e}")))
}

fn breadcrumbs_of(rule: &str, parts: &[RulePart]) -> Vec<Breadcrumb> {
	// Variable names in rule order, so each dynamic segment can name its first one.
	let mut names = parts.iter().filter_map(|p| match p {
		RulePart::Variable { name, .. } => Some(name.as_str()),
		RulePart::Static(_) => None,
	});
	rule.split('/')
		.filter(|segment| !segment.is_empty())
		.map(|segment| {
			let count = segment.matches('<').count();
			if count == 0 {
				return Breadcrumb {
					is_dynamic: false,
					name: segment.to_string(),
				};
			}
			let first = names.next().unwrap_or_default().to_string();
			for _ in 1..count {
				names.next();
			}
			Breadcrumb {
				is_dynamic: true,
				name: first,
			}
		})
		.collect()
}

impl Route {
	/// Compiles `rule` with the built-in converters.
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_urls::route::Route;
	///
	/// let route = Route::new("/blog//<slug>/").unwrap();
	/// assert_eq!(route.rule(), "blog/<slug>/");
	/// assert_eq!(route.path(), "/blog/<slug>/");
	/// assert!(!route.is_leaf());
	/// ```
	pub fn new(rule: &str) -> Result<Self> {
		Self::with_converters(rule, &DEFAULT_CONVERTERS)
	}

	/// Compiles `rule`, looking converters up in `converters`.
	pub fn with_converters(rule: &str, converters: &ConverterRegistry) -> Result<Self> {
		let rule = normalize_rule(rule);
		let parts = parse_rule(&rule, converters)?;
		Self::from_parts(rule, parts, UrlArgs::new())
	}

	/// The non-leaf route matching every path.
	pub fn root() -> Self {
		ROOT.clone()
	}

	fn from_parts(rule: String, parts: Vec<RulePart>, defaults: UrlArgs) -> Result<Self> {
		check_variables(&rule, &parts)?;
		let is_leaf = !rule.is_empty() && !rule.ends_with('/');
		let regex = compile(&rule, &parts, is_leaf)?;
		let breadcrumbs = breadcrumbs_of(&rule, &parts);
		Ok(Self {
			rule,
			parts,
			regex,
			breadcrumbs,
			defaults,
			is_leaf,
		})
	}

	/// Adds default values, used when matching and when building URLs.
	pub fn with_defaults(mut self, defaults: UrlArgs) -> Self {
		self.defaults.extend(defaults);
		self
	}

	/// The normalized rule, without leading slash.
	pub fn rule(&self) -> &str {
		&self.rule
	}

	/// The rule as an absolute path.
	pub fn path(&self) -> String {
		format!("/{}", self.rule)
	}

	/// Whether the route must match the whole remaining path.
	pub fn is_leaf(&self) -> bool {
		self.is_leaf
	}

	/// Whether the rule has no variables.
	pub fn is_static(&self) -> bool {
		self.parts.iter().all(|p| matches!(p, RulePart::Static(_)))
	}

	/// Segment breadcrumbs.
	pub fn breadcrumbs(&self) -> &[Breadcrumb] {
		&self.breadcrumbs
	}

	/// Default values.
	pub fn defaults(&self) -> &UrlArgs {
		&self.defaults
	}

	/// Variable names in rule order.
	pub fn variables(&self) -> impl Iterator<Item = &str> {
		self.parts.iter().filter_map(|p| match p {
			RulePart::Variable { name, .. } => Some(name.as_str()),
			RulePart::Static(_) => None,
		})
	}

	/// Matches `path`, given relative to wherever the route is mounted (no
	/// leading slash).
	///
	/// Returns `None` when the regex does not match or a converter rejects
	/// the captured text.
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_urls::route::Route;
	///
	/// let route = Route::new("docs/").unwrap();
	/// let found = route.match_path("docs/intro/setup").unwrap();
	/// assert_eq!(found.remainder.as_deref(), Some("intro/setup"));
	/// assert!(route.match_path("blog/").is_none());
	/// ```
	pub fn match_path(&self, path: &str) -> Option<RouteMatch> {
		let caps = self.regex.captures(path)?;
		let mut vars = self.defaults.clone();
		for part in &self.parts {
			if let RulePart::Variable { name, converter } = part {
				let raw = caps.name(name)?.as_str();
				match converter.to_value(raw) {
					Ok(value) => {
						vars.insert(name.clone(), value);
					}
					Err(err) => {
						tracing::trace!(rule = %self.rule, %err, "converter rejected path segment");
						return None;
					}
				}
			}
		}
		let remainder = if self.is_leaf {
			None
		} else {
			Some(caps.name(REMAINING).map_or("", |m| m.as_str()).to_string())
		};
		Some(RouteMatch { vars, remainder })
	}

	/// Builds the absolute URL of this route.
	///
	/// Variables missing from `args` fall back to the route defaults; a
	/// variable with neither fails with [`Error::MissingArgument`]. Unused
	/// arguments are ignored.
	pub fn build_url(&self, args: &UrlArgs) -> Result<String> {
		let mut url = String::from("/");
		for part in &self.parts {
			match part {
				RulePart::Static(text) => url.push_str(text),
				RulePart::Variable { name, converter } => {
					let value = args
						.get(name)
						.or_else(|| self.defaults.get(name))
						.ok_or_else(|| Error::MissingArgument(name.clone()))?;
					let text = converter.to_url(value).map_err(|e| {
						Error::Internal(format!("cannot build '{}' for variable '{name}': {e}", self.rule))
					})?;
					url.push_str(&text);
				}
			}
		}
		Ok(url)
	}

	/// Appends `other` below this route.
	///
	/// # Errors
	///
	/// Fails when this route is a leaf or both routes share a variable name.
	pub fn join(&self, other: &Route) -> Result<Route> {
		if self.is_leaf {
			return Err(Error::ImproperlyConfigured(format!(
				"cannot append '{}' to leaf route '{}'",
				other.rule, self.rule
			)));
		}
		let mut parts = self.parts.clone();
		parts.extend(other.parts.iter().cloned());
		let mut defaults = self.defaults.clone();
		defaults.extend(other.defaults.clone());
		Self::from_parts(format!("{}{}", self.rule, other.rule), parts, defaults)
	}
}
