//! Typed path converters.
//!
//! A converter contributes the regex fragment a route variable matches and
//! turns the matched text into a [`PathValue`] (and back, when building
//! URLs). Converters are looked up by name in a [`ConverterRegistry`]; the
//! process-wide [`DEFAULT_CONVERTERS`] holds the built-ins:
//!
//! | Name | Matches | Arguments |
//! |------|---------|-----------|
//! | `default`, `string` | one segment | `minlength`, `maxlength`, `length` |
//! | `int` | unsigned digits | `fixed_digits`, `min`, `max` |
//! | `float` | unsigned decimal | `min`, `max` |
//! | `any` | one of the listed words | the words |
//! | `path` | anything, including `/` | none |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use djpcms_core::{Error, Result};
use once_cell::sync::Lazy;
use serde::Serialize;

/// A converted route variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PathValue {
	/// Integer variable.
	Int(i64),
	/// Float variable.
	Float(f64),
	/// Text variable.
	Str(String),
}

impl PathValue {
	/// The text of a [`PathValue::Str`].
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(s) => Some(s),
			_ => None,
		}
	}

	/// The value of a [`PathValue::Int`].
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(i) => Some(*i),
			_ => None,
		}
	}
}

impl fmt::Display for PathValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Int(i) => write!(f, "{i}"),
			Self::Float(x) => write!(f, "{x}"),
			Self::Str(s) => f.write_str(s),
		}
	}
}

impl From<i64> for PathValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<f64> for PathValue {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<&str> for PathValue {
	fn from(value: &str) -> Self {
		Self::Str(value.to_string())
	}
}

impl From<String> for PathValue {
	fn from(value: String) -> Self {
		Self::Str(value)
	}
}

/// A value could not be converted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot convert '{value}': {reason}")]
pub struct ConversionError {
	/// Offending value.
	pub value: String,
	/// What was wrong with it.
	pub reason: String,
}

impl ConversionError {
	fn new(value: impl fmt::Display, reason: impl Into<String>) -> Self {
		Self {
			value: value.to_string(),
			reason: reason.into(),
		}
	}
}

/// Converts one route variable between its path text and its value.
pub trait Converter: Send + Sync + fmt::Debug {
	/// Regex fragment matched by the variable. Must not contain capturing groups.
	fn regex(&self) -> &str;

	/// Converts matched path text.
	fn to_value(&self, raw: &str) -> std::result::Result<PathValue, ConversionError>;

	/// Converts a value into path text.
	fn to_url(&self, value: &PathValue) -> std::result::Result<String, ConversionError>;
}

/// A literal in a converter argument list.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
	/// Integer literal.
	Int(i64),
	/// Float literal.
	Float(f64),
	/// `true` / `false`.
	Bool(bool),
	/// Quoted or bare string.
	Str(String),
}

impl ArgValue {
	fn parse(raw: &str) -> Self {
		let raw = raw.trim();
		let bytes = raw.as_bytes();
		if bytes.len() >= 2
			&& (bytes[0] == b'"' || bytes[0] == b'\'')
			&& bytes[bytes.len() - 1] == bytes[0]
		{
			return Self::Str(raw[1..raw.len() - 1].to_string());
		}
		match raw {
			"true" | "True" => return Self::Bool(true),
			"false" | "False" => return Self::Bool(false),
			_ => {}
		}
		if let Ok(i) = raw.parse::<i64>() {
			return Self::Int(i);
		}
		let numeric = raw
			.chars()
			.next()
			.is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
		if numeric && let Ok(x) = raw.parse::<f64>() {
			return Self::Float(x);
		}
		Self::Str(raw.to_string())
	}

	fn as_text(&self) -> String {
		match self {
			Self::Int(i) => i.to_string(),
			Self::Float(x) => x.to_string(),
			Self::Bool(b) => b.to_string(),
			Self::Str(s) => s.clone(),
		}
	}
}

/// Parsed converter arguments: `int(4, max=9999)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConverterArgs {
	/// Positional arguments in order.
	pub positional: Vec<ArgValue>,
	/// Keyword arguments in order.
	pub keyword: Vec<(String, ArgValue)>,
}

fn is_identifier(s: &str) -> bool {
	let mut chars = s.chars();
	chars
		.next()
		.is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_top_level(raw: &str) -> Result<Vec<&str>> {
	let mut items = Vec::new();
	let mut quote: Option<char> = None;
	let mut start = 0;
	for (i, c) in raw.char_indices() {
		match (quote, c) {
			(Some(q), c) if c == q => quote = None,
			(Some(_), _) => {}
			(None, '"' | '\'') => quote = Some(c),
			(None, ',') => {
				items.push(&raw[start..i]);
				start = i + 1;
			}
			(None, _) => {}
		}
	}
	if quote.is_some() {
		return Err(Error::ImproperlyConfigured(format!(
			"unterminated string in converter arguments '{raw}'"
		)));
	}
	items.push(&raw[start..]);
	Ok(items)
}

impl ConverterArgs {
	/// Parses an argument list (the text between the parentheses).
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_urls::converters::{ArgValue, ConverterArgs};
	///
	/// let args = ConverterArgs::parse("4, max=9999, label='a,b'").unwrap();
	/// assert_eq!(args.positional, vec![ArgValue::Int(4)]);
	/// assert_eq!(args.keyword[0], ("max".to_string(), ArgValue::Int(9999)));
	/// assert_eq!(args.keyword[1].1, ArgValue::Str("a,b".to_string()));
	/// ```
	pub fn parse(raw: &str) -> Result<Self> {
		let mut args = Self::default();
		if raw.trim().is_empty() {
			return Ok(args);
		}
		for item in split_top_level(raw)? {
			let item = item.trim();
			if item.is_empty() {
				continue;
			}
			if let Some((key, value)) = item.split_once('=')
				&& is_identifier(key.trim())
			{
				args.keyword
					.push((key.trim().to_string(), ArgValue::parse(value)));
				continue;
			}
			if !args.keyword.is_empty() {
				return Err(Error::ImproperlyConfigured(format!(
					"positional converter argument '{item}' follows keyword arguments"
				)));
			}
			args.positional.push(ArgValue::parse(item));
		}
		Ok(args)
	}

	/// Keyword argument `name`, else positional argument `index`.
	pub fn get(&self, index: usize, name: &str) -> Option<&ArgValue> {
		self.keyword
			.iter()
			.find(|(k, _)| k == name)
			.map(|(_, v)| v)
			.or_else(|| self.positional.get(index))
	}

	fn int(&self, index: usize, name: &str) -> Result<Option<i64>> {
		match self.get(index, name) {
			None => Ok(None),
			Some(ArgValue::Int(i)) => Ok(Some(*i)),
			Some(other) => Err(Error::ImproperlyConfigured(format!(
				"converter argument '{name}' must be an integer, got {other:?}"
			))),
		}
	}

	fn usize(&self, index: usize, name: &str) -> Result<Option<usize>> {
		match self.int(index, name)? {
			None => Ok(None),
			Some(i) => usize::try_from(i).map(Some).map_err(|_| {
				Error::ImproperlyConfigured(format!("converter argument '{name}' must not be negative"))
			}),
		}
	}

	fn float(&self, index: usize, name: &str) -> Result<Option<f64>> {
		match self.get(index, name) {
			None => Ok(None),
			Some(ArgValue::Int(i)) => Ok(Some(*i as f64)),
			Some(ArgValue::Float(x)) => Ok(Some(*x)),
			Some(other) => Err(Error::ImproperlyConfigured(format!(
				"converter argument '{name}' must be a number, got {other:?}"
			))),
		}
	}
}

/// One path segment, optionally bounded in length.
#[derive(Debug, Clone)]
pub struct StringConverter {
	regex: String,
	minlength: usize,
	maxlength: Option<usize>,
}

impl StringConverter {
	/// `length` wins over `minlength`/`maxlength`.
	pub fn new(minlength: usize, maxlength: Option<usize>, length: Option<usize>) -> Self {
		let (minlength, maxlength) = match length {
			Some(n) => (n, Some(n)),
			None => (minlength, maxlength),
		};
		let regex = match (length, maxlength) {
			(Some(n), _) => format!("[^/]{{{n}}}"),
			(None, Some(max)) => format!("[^/]{{{minlength},{max}}}"),
			(None, None) => format!("[^/]{{{minlength},}}"),
		};
		Self {
			regex,
			minlength,
			maxlength,
		}
	}

	fn check(&self, text: &str) -> std::result::Result<(), ConversionError> {
		let len = text.chars().count();
		if text.contains('/') {
			return Err(ConversionError::new(text, "contains '/'"));
		}
		if len < self.minlength || self.maxlength.is_some_and(|max| len > max) {
			return Err(ConversionError::new(text, "length out of bounds"));
		}
		Ok(())
	}
}

impl Default for StringConverter {
	fn default() -> Self {
		Self::new(1, None, None)
	}
}

impl Converter for StringConverter {
	fn regex(&self) -> &str {
		&self.regex
	}

	fn to_value(&self, raw: &str) -> std::result::Result<PathValue, ConversionError> {
		self.check(raw)?;
		Ok(PathValue::Str(raw.to_string()))
	}

	fn to_url(&self, value: &PathValue) -> std::result::Result<String, ConversionError> {
		let text = value.to_string();
		self.check(&text)?;
		Ok(text)
	}
}

/// Unsigned integer.
#[derive(Debug, Clone)]
pub struct IntegerConverter {
	regex: String,
	fixed_digits: usize,
	min: Option<i64>,
	max: Option<i64>,
}

impl IntegerConverter {
	/// `fixed_digits == 0` accepts any digit count.
	pub fn new(fixed_digits: usize, min: Option<i64>, max: Option<i64>) -> Self {
		let regex = if fixed_digits > 0 {
			format!("\\d{{{fixed_digits}}}")
		} else {
			"\\d+".to_string()
		};
		Self {
			regex,
			fixed_digits,
			min,
			max,
		}
	}

	fn check_range(&self, value: i64) -> std::result::Result<(), ConversionError> {
		if value < 0 {
			return Err(ConversionError::new(value, "negative"));
		}
		if self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max) {
			return Err(ConversionError::new(value, "out of range"));
		}
		Ok(())
	}
}

impl Converter for IntegerConverter {
	fn regex(&self) -> &str {
		&self.regex
	}

	fn to_value(&self, raw: &str) -> std::result::Result<PathValue, ConversionError> {
		if self.fixed_digits > 0 && raw.len() != self.fixed_digits {
			return Err(ConversionError::new(
				raw,
				format!("expected {} digits", self.fixed_digits),
			));
		}
		if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
			return Err(ConversionError::new(raw, "not an unsigned integer"));
		}
		let value: i64 = raw
			.parse()
			.map_err(|_| ConversionError::new(raw, "integer overflow"))?;
		self.check_range(value)?;
		Ok(PathValue::Int(value))
	}

	fn to_url(&self, value: &PathValue) -> std::result::Result<String, ConversionError> {
		let number = match value {
			PathValue::Int(i) => *i,
			PathValue::Str(s) => s
				.parse()
				.map_err(|_| ConversionError::new(s, "not an integer"))?,
			PathValue::Float(x) => return Err(ConversionError::new(x, "not an integer")),
		};
		self.check_range(number)?;
		let width = self.fixed_digits;
		let text = format!("{number:0width$}");
		if width > 0 && text.len() != width {
			return Err(ConversionError::new(number, format!("more than {width} digits")));
		}
		Ok(text)
	}
}

/// Unsigned decimal number with a fractional part.
#[derive(Debug, Clone)]
pub struct FloatConverter {
	min: Option<f64>,
	max: Option<f64>,
}

impl FloatConverter {
	/// Creates a float converter with optional bounds.
	pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
		Self { min, max }
	}

	fn check(&self, value: f64) -> std::result::Result<(), ConversionError> {
		if !value.is_finite() || value < 0.0 {
			return Err(ConversionError::new(value, "not an unsigned finite number"));
		}
		if self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max) {
			return Err(ConversionError::new(value, "out of range"));
		}
		Ok(())
	}
}

impl Converter for FloatConverter {
	fn regex(&self) -> &str {
		"\\d+\\.\\d+"
	}

	fn to_value(&self, raw: &str) -> std::result::Result<PathValue, ConversionError> {
		let value: f64 = raw
			.parse()
			.map_err(|_| ConversionError::new(raw, "not a number"))?;
		self.check(value)?;
		Ok(PathValue::Float(value))
	}

	fn to_url(&self, value: &PathValue) -> std::result::Result<String, ConversionError> {
		let number = match value {
			PathValue::Float(x) => *x,
			PathValue::Int(i) => *i as f64,
			PathValue::Str(s) => s
				.parse()
				.map_err(|_| ConversionError::new(s, "not a number"))?,
		};
		self.check(number)?;
		let mut text = number.to_string();
		if !text.contains('.') {
			text.push_str(".0");
		}
		Ok(text)
	}
}

/// One of a fixed set of words.
#[derive(Debug, Clone)]
pub struct AnyConverter {
	regex: String,
	items: Vec<String>,
}

impl AnyConverter {
	/// Matches exactly one of `items`.
	pub fn new(items: Vec<String>) -> Self {
		let alternatives: Vec<String> = items.iter().map(|i| regex::escape(i)).collect();
		Self {
			regex: format!("(?:{})", alternatives.join("|")),
			items,
		}
	}
}

impl Converter for AnyConverter {
	fn regex(&self) -> &str {
		&self.regex
	}

	fn to_value(&self, raw: &str) -> std::result::Result<PathValue, ConversionError> {
		if self.items.iter().any(|i| i == raw) {
			Ok(PathValue::Str(raw.to_string()))
		} else {
			Err(ConversionError::new(raw, "not one of the allowed values"))
		}
	}

	fn to_url(&self, value: &PathValue) -> std::result::Result<String, ConversionError> {
		let text = value.to_string();
		self.to_value(&text)?;
		Ok(text)
	}
}

/// Any non-empty text, including `/`.
#[derive(Debug, Clone, Default)]
pub struct PathConverter;

impl Converter for PathConverter {
	fn regex(&self) -> &str {
		"[^/].*?"
	}

	fn to_value(&self, raw: &str) -> std::result::Result<PathValue, ConversionError> {
		if raw.is_empty() || raw.starts_with('/') {
			return Err(ConversionError::new(raw, "empty or absolute path"));
		}
		Ok(PathValue::Str(raw.to_string()))
	}

	fn to_url(&self, value: &PathValue) -> std::result::Result<String, ConversionError> {
		let text = value.to_string();
		self.to_value(&text)?;
		Ok(text)
	}
}

/// Builds a converter from parsed arguments.
pub type ConverterFactory = Arc<dyn Fn(&ConverterArgs) -> Result<Arc<dyn Converter>> + Send + Sync>;

/// Converters by name.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
	factories: HashMap<String, ConverterFactory>,
}

impl fmt::Debug for ConverterRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut names: Vec<&String> = self.factories.keys().collect();
		names.sort();
		f.debug_struct("ConverterRegistry").field("converters", &names).finish()
	}
}

fn string_factory(args: &ConverterArgs) -> Result<Arc<dyn Converter>> {
	let minlength = args.usize(0, "minlength")?.unwrap_or(1);
	let maxlength = args.usize(1, "maxlength")?;
	let length = args.usize(2, "length")?;
	Ok(Arc::new(StringConverter::new(minlength, maxlength, length)))
}

impl ConverterRegistry {
	/// An empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// A registry holding the built-in converters.
	pub fn builtin() -> Self {
		let mut registry = Self::new();
		registry.register("default", Arc::new(string_factory));
		registry.register("string", Arc::new(string_factory));
		registry.register(
			"int",
			Arc::new(|args: &ConverterArgs| -> Result<Arc<dyn Converter>> {
				Ok(Arc::new(IntegerConverter::new(
					args.usize(0, "fixed_digits")?.unwrap_or(0),
					args.int(1, "min")?,
					args.int(2, "max")?,
				)))
			}),
		);
		registry.register(
			"float",
			Arc::new(|args: &ConverterArgs| -> Result<Arc<dyn Converter>> {
				Ok(Arc::new(FloatConverter::new(
					args.float(0, "min")?,
					args.float(1, "max")?,
				)))
			}),
		);
		registry.register(
			"any",
			Arc::new(|args: &ConverterArgs| -> Result<Arc<dyn Converter>> {
				if args.positional.is_empty() {
					return Err(Error::ImproperlyConfigured(
						"the 'any' converter needs at least one value".to_string(),
					));
				}
				Ok(Arc::new(AnyConverter::new(
					args.positional.iter().map(ArgValue::as_text).collect(),
				)))
			}),
		);
		registry.register(
			"path",
			Arc::new(|_: &ConverterArgs| -> Result<Arc<dyn Converter>> { Ok(Arc::new(PathConverter)) }),
		);
		registry
	}

	/// Registers (or replaces) a converter factory.
	pub fn register(&mut self, name: impl Into<String>, factory: ConverterFactory) {
		self.factories.insert(name.into(), factory);
	}

	/// Whether `name` is registered.
	pub fn contains(&self, name: &str) -> bool {
		self.factories.contains_key(name)
	}

	/// Instantiates converter `name` with the raw argument text.
	pub fn build(&self, name: &str, raw_args: Option<&str>) -> Result<Arc<dyn Converter>> {
		let factory = self
			.factories
			.get(name)
			.ok_or_else(|| Error::ImproperlyConfigured(format!("unknown converter '{name}'")))?;
		let args = ConverterArgs::parse(raw_args.unwrap_or(""))?;
		factory(&args)
	}
}

/// Registry holding the built-in converters.
pub static DEFAULT_CONVERTERS: Lazy<ConverterRegistry> = Lazy::new(ConverterRegistry::builtin);

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn build(name: &str, args: Option<&str>) -> Arc<dyn Converter> {
		DEFAULT_CONVERTERS.build(name, args).unwrap()
	}

	#[rstest]
	#[case("5", ArgValue::Int(5))]
	#[case("-2.5", ArgValue::Float(-2.5))]
	#[case("True", ArgValue::Bool(true))]
	#[case("'x y'", ArgValue::Str("x y".to_string()))]
	#[case("\"q\"", ArgValue::Str("q".to_string()))]
	#[case("bare", ArgValue::Str("bare".to_string()))]
	#[case("inf", ArgValue::Str("inf".to_string()))]
	fn test_arg_literals(#[case] raw: &str, #[case] expected: ArgValue) {
		assert_eq!(ArgValue::parse(raw), expected);
	}

	#[rstest]
	fn test_positional_after_keyword_is_rejected() {
		let result = ConverterArgs::parse("min=1, 4");

		assert!(matches!(result, Err(Error::ImproperlyConfigured(_))));
	}

	#[rstest]
	fn test_unterminated_quote_is_rejected() {
		assert!(ConverterArgs::parse("'abc").is_err());
	}

	#[rstest]
	#[case("abc", true)]
	#[case("a", false)]
	#[case("abcdef", false)]
	fn test_string_bounds(#[case] raw: &str, #[case] ok: bool) {
		let converter = build("string", Some("minlength=2, maxlength=5"));

		assert_eq!(converter.to_value(raw).is_ok(), ok);
	}

	#[rstest]
	fn test_string_length_regex() {
		assert_eq!(build("default", Some("length=3")).regex(), "[^/]{3}");
		assert_eq!(build("default", None).regex(), "[^/]{1,}");
	}

	#[rstest]
	#[case("0042", Ok(PathValue::Int(42)))]
	#[case("42", Err(()))]
	#[case("10000", Err(()))]
	fn test_int_fixed_digits(#[case] raw: &str, #[case] expected: std::result::Result<PathValue, ()>) {
		let converter = build("int", Some("fixed_digits=4"));

		assert_eq!(converter.to_value(raw).map_err(|_| ()), expected);
	}

	#[rstest]
	fn test_int_range_and_padding() {
		// Arrange
		let converter = build("int", Some("3, min=5, max=500"));

		// Act
		let low = converter.to_value("004");
		let url = converter.to_url(&PathValue::Int(7));
		let too_high = converter.to_url(&PathValue::Int(501));

		// Assert
		assert!(low.is_err());
		assert_eq!(url.unwrap(), "007");
		assert!(too_high.is_err());
	}

	#[rstest]
	fn test_int_overflow_is_a_conversion_error() {
		let converter = build("int", None);

		let err = converter.to_value("99999999999999999999").unwrap_err();

		assert_eq!(err.reason, "integer overflow");
	}

	#[rstest]
	fn test_float_to_url_keeps_fraction() {
		let converter = build("float", Some("max=10"));

		assert_eq!(converter.to_url(&PathValue::Float(2.0)).unwrap(), "2.0");
		assert_eq!(converter.to_url(&PathValue::Float(2.25)).unwrap(), "2.25");
		assert!(converter.to_value("11.5").is_err());
	}

	#[rstest]
	fn test_any_escapes_alternatives() {
		let converter = build("any", Some("'a.b', c"));

		assert_eq!(converter.regex(), "(?:a\\.b|c)");
		assert!(converter.to_value("c").is_ok());
		assert!(converter.to_url(&PathValue::from("d")).is_err());
	}

	#[rstest]
	fn test_any_without_values() {
		assert!(DEFAULT_CONVERTERS.build("any", None).is_err());
	}

	#[rstest]
	fn test_unknown_converter() {
		let err = DEFAULT_CONVERTERS.build("uuid", None).unwrap_err();

		assert_eq!(err.to_string(), "improperly configured: unknown converter 'uuid'");
	}

	#[rstest]
	fn test_custom_registry() {
		// Arrange
		let mut registry = ConverterRegistry::builtin();
		registry.register(
			"year",
			Arc::new(|_: &ConverterArgs| -> Result<Arc<dyn Converter>> {
				Ok(Arc::new(IntegerConverter::new(4, Some(1900), None)))
			}),
		);

		// Act
		let converter = registry.build("year", None).unwrap();

		// Assert
		assert!(converter.to_value("1899").is_err());
		assert_eq!(converter.to_value("2024").unwrap(), PathValue::Int(2024));
		assert!(!DEFAULT_CONVERTERS.contains("year"));
	}
}
