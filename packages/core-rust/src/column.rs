//! Column definitions and their chainable builders.
//!
//! A [`ColumnDef`] binds a wire property name to a codec plus constraint
//! flags. Builders are immutable: every modifier takes `&self` and returns a
//! new value, so intermediate builder states stay valid and independent.
//!
//! ```
//! use docorm_core::column::{select, text, ColumnDef};
//!
//! let stage = select("Stage").options(["Todo", "Done"]).nullable();
//! let name: ColumnDef = text("Name").title().into();
//! assert!(stage.def().is_nullable());
//! assert!(name.config().get("Name").is_some());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::codec::{
    CheckboxCodec, Codec, ContactCodec, DateCodec, FilesCodec, MultiSelectCodec, NumberCodec,
    PeopleCodec, RelationCodec, RichTextCodec, SelectCodec, SystemCodec, TitleCodec,
    UniqueIdCodec,
};
use crate::error::{Error, Result};
use crate::property::PropertyType;
use crate::value::Value;

// ---------------------------------------------------------------------------
// ColumnDef
// ---------------------------------------------------------------------------

/// Immutable specification of one mapped property.
///
/// The property type and read-only flag are derived from the codec, so they
/// always agree with the schema fragment the column emits.
#[derive(Clone)]
pub struct ColumnDef {
    name: String,
    codec: Arc<dyn Codec>,
    optional: bool,
    nullable: bool,
    default: Option<Value>,
}

impl ColumnDef {
    /// Creates a required, non-nullable column backed by `codec`.
    #[must_use]
    pub fn new(name: impl Into<String>, codec: Arc<dyn Codec>) -> Self {
        Self {
            name: name.into(),
            codec,
            optional: false,
            nullable: false,
            default: None,
        }
    }

    /// Wire property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        self.codec.property_type()
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.property_type().is_read_only()
    }

    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Schema fragment `{name: {wire_key: {...}}}` for this column.
    #[must_use]
    pub fn config(&self) -> JsonValue {
        self.codec.config(&self.name)
    }

    /// Returns a copy that may be omitted on insert.
    #[must_use]
    pub fn optional(&self) -> Self {
        Self {
            optional: true,
            ..self.clone()
        }
    }

    /// Returns a copy that accepts and yields `null`.
    #[must_use]
    pub fn nullable(&self) -> Self {
        Self {
            nullable: true,
            ..self.clone()
        }
    }

    /// Returns a copy that substitutes `value` when the column is omitted on insert.
    #[must_use]
    pub fn default(&self, value: impl Into<Value>) -> Self {
        Self {
            default: Some(value.into()),
            ..self.clone()
        }
    }

    /// Returns a copy with the same flags but a different codec.
    #[must_use]
    pub fn with_codec(&self, codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            ..self.clone()
        }
    }
}

impl fmt::Debug for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("name", &self.name)
            .field("property_type", &self.property_type())
            .field("optional", &self.optional)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Typed builders
// ---------------------------------------------------------------------------

/// Builder kind for free-text columns; enables [`Column::title`].
#[derive(Debug, Clone, Copy)]
pub struct Text;

/// Builder kind for choice columns; enables [`Column::options`].
#[derive(Debug, Clone, Copy)]
pub struct Choice;

/// Builder kind for unique-id columns; enables [`Column::prefix`].
#[derive(Debug, Clone, Copy)]
pub struct UniqueId;

/// Builder kind with no kind-specific modifiers.
#[derive(Debug, Clone, Copy)]
pub struct Plain;

/// Chainable column builder tagged with its kind.
///
/// Converts into [`ColumnDef`] with `.into()`.
#[derive(Debug, Clone)]
pub struct Column<K = Plain> {
    def: ColumnDef,
    kind: PhantomData<K>,
}

impl<K> Column<K> {
    fn wrap(def: ColumnDef) -> Self {
        Self {
            def,
            kind: PhantomData,
        }
    }

    /// The definition built so far.
    #[must_use]
    pub fn def(&self) -> &ColumnDef {
        &self.def
    }

    #[must_use]
    pub fn optional(&self) -> Self {
        Self::wrap(self.def.optional())
    }

    #[must_use]
    pub fn nullable(&self) -> Self {
        Self::wrap(self.def.nullable())
    }

    #[must_use]
    pub fn default(&self, value: impl Into<Value>) -> Self {
        Self::wrap(self.def.default(value))
    }
}

impl Column<Text> {
    /// Swaps the rich-text codec for the title codec.
    #[must_use]
    pub fn title(&self) -> Self {
        Self::wrap(self.def.with_codec(Arc::new(TitleCodec)))
    }
}

impl Column<Choice> {
    /// Narrows accepted values to exactly `options` and declares them in the schema.
    #[must_use]
    pub fn options<I, S>(&self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.into_iter().map(Into::into).collect();
        Self::wrap(self.def.with_codec(choice_codec(self.def.property_type(), Some(options))))
    }

    /// Accepts any option name again.
    #[must_use]
    pub fn allow_custom_options(&self) -> Self {
        Self::wrap(self.def.with_codec(choice_codec(self.def.property_type(), None)))
    }
}

impl Column<UniqueId> {
    /// Declares the identifier prefix (e.g. `"TASK"` for `TASK-12`).
    #[must_use]
    pub fn prefix(&self, prefix: impl Into<String>) -> Self {
        Self::wrap(self.def.with_codec(Arc::new(UniqueIdCodec::with_prefix(prefix))))
    }
}

fn choice_codec(kind: PropertyType, options: Option<Vec<String>>) -> Arc<dyn Codec> {
    match kind {
        PropertyType::MultiSelect => Arc::new(MultiSelectCodec::default().with_options(options)),
        PropertyType::Status => Arc::new(SelectCodec::status().with_options(options)),
        _ => Arc::new(SelectCodec::select().with_options(options)),
    }
}

impl<K> From<Column<K>> for ColumnDef {
    fn from(column: Column<K>) -> Self {
        column.def
    }
}

impl<K> From<&Column<K>> for ColumnDef {
    fn from(column: &Column<K>) -> Self {
        column.def.clone()
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

fn build<K>(name: impl Into<String>, codec: impl Codec + 'static) -> Column<K> {
    Column::wrap(ColumnDef::new(name, Arc::new(codec)))
}

/// Title column (the collection's primary text property).
#[must_use]
pub fn title(name: impl Into<String>) -> Column<Text> {
    build(name, TitleCodec)
}

/// Rich-text column; `.title()` turns it into the title column.
#[must_use]
pub fn text(name: impl Into<String>) -> Column<Text> {
    build(name, RichTextCodec)
}

#[must_use]
pub fn number(name: impl Into<String>) -> Column {
    build(name, NumberCodec::default())
}

/// Number column declaring a display format such as `"percent"`.
#[must_use]
pub fn number_with_format(name: impl Into<String>, format: impl Into<String>) -> Column {
    build(name, NumberCodec::with_format(format))
}

#[must_use]
pub fn checkbox(name: impl Into<String>) -> Column {
    build(name, CheckboxCodec)
}

#[must_use]
pub fn date(name: impl Into<String>) -> Column {
    build(name, DateCodec)
}

#[must_use]
pub fn url(name: impl Into<String>) -> Column {
    build(name, ContactCodec::url())
}

#[must_use]
pub fn email(name: impl Into<String>) -> Column {
    build(name, ContactCodec::email())
}

#[must_use]
pub fn phone_number(name: impl Into<String>) -> Column {
    build(name, ContactCodec::phone_number())
}

#[must_use]
pub fn select(name: impl Into<String>) -> Column<Choice> {
    build(name, SelectCodec::select())
}

#[must_use]
pub fn status(name: impl Into<String>) -> Column<Choice> {
    build(name, SelectCodec::status())
}

#[must_use]
pub fn multi_select(name: impl Into<String>) -> Column<Choice> {
    build(name, MultiSelectCodec::default())
}

#[must_use]
pub fn people(name: impl Into<String>) -> Column {
    build(name, PeopleCodec)
}

#[must_use]
pub fn files(name: impl Into<String>) -> Column {
    build(name, FilesCodec)
}

/// Relation column. Its target is declared by registering or linking it.
#[must_use]
pub fn relation(name: impl Into<String>) -> Column {
    build(name, RelationCodec)
}

#[must_use]
pub fn created_time(name: impl Into<String>) -> Column {
    build(name, SystemCodec::created_time())
}

#[must_use]
pub fn last_edited_time(name: impl Into<String>) -> Column {
    build(name, SystemCodec::last_edited_time())
}

#[must_use]
pub fn created_by(name: impl Into<String>) -> Column {
    build(name, SystemCodec::created_by())
}

#[must_use]
pub fn last_edited_by(name: impl Into<String>) -> Column {
    build(name, SystemCodec::last_edited_by())
}

#[must_use]
pub fn unique_id(name: impl Into<String>) -> Column<UniqueId> {
    build(name, UniqueIdCodec::default())
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// Ordered set of columns keyed by local field key.
#[derive(Debug, Clone, Default)]
pub struct Columns {
    entries: BTreeMap<String, ColumnDef>,
}

impl Columns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the column stored under `key`.
    #[must_use]
    pub fn column(mut self, key: impl Into<String>, column: impl Into<ColumnDef>) -> Self {
        self.entries.insert(key.into(), column.into());
        self
    }

    /// Looks up a column by local key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] if no column is stored under `key`.
    pub fn get(&self, key: &str) -> Result<&ColumnDef> {
        self.entries.get(key).ok_or_else(|| Error::UnknownColumn {
            key: key.to_string(),
        })
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnDef)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Finds the local key of the column with wire name `name`.
    #[must_use]
    pub fn key_for_name(&self, name: &str) -> Option<&str> {
        self.iter().find(|(_, c)| c.name() == name).map(|(k, _)| k)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, C: Into<ColumnDef>> FromIterator<(K, C)> for Columns {
    fn from_iter<I: IntoIterator<Item = (K, C)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, c)| (k.into(), c.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn modifiers_return_independent_snapshots() {
        let base = number("Points");
        let optional = base.optional();
        let both = optional.nullable().default(3);

        assert!(!base.def().is_optional());
        assert!(optional.def().is_optional() && !optional.def().is_nullable());
        assert!(both.def().is_optional() && both.def().is_nullable());
        assert_eq!(both.def().default_value(), Some(&Value::Int(3)));
        assert_eq!(optional.def().default_value(), None);
    }

    #[test]
    fn title_swaps_codec_without_touching_original() {
        let body = text("Name");
        let heading = body.title();
        assert_eq!(body.def().property_type(), PropertyType::RichText);
        assert_eq!(heading.def().property_type(), PropertyType::Title);
        assert_eq!(heading.def().config(), json!({"Name": {"title": {}}}));
    }

    #[test]
    fn options_narrow_and_revert() {
        let open = select("Stage");
        let narrowed = open.options(["Todo", "Done"]);
        assert_eq!(
            narrowed.def().config(),
            json!({"Stage": {"select": {"options": [{"name": "Todo"}, {"name": "Done"}]}}})
        );
        assert!(narrowed.def().codec().parse(&Value::from("Blocked")).is_err());
        let reverted = narrowed.allow_custom_options();
        assert_eq!(reverted.def().config(), json!({"Stage": {"select": {}}}));
        assert!(reverted.def().codec().parse(&Value::from("Blocked")).is_ok());
    }

    #[test]
    fn options_keep_status_and_multi_select_kinds() {
        assert_eq!(
            status("State").options(["Open"]).def().property_type(),
            PropertyType::Status
        );
        assert_eq!(
            multi_select("Tags").options(["a"]).def().property_type(),
            PropertyType::MultiSelect
        );
    }

    #[test]
    fn options_keep_flags() {
        let col = select("Stage").nullable().optional().options(["A"]);
        assert!(col.def().is_nullable() && col.def().is_optional());
    }

    #[test]
    fn read_only_flag_follows_codec() {
        assert!(created_time("Created").def().is_read_only());
        assert!(unique_id("ID").prefix("T").def().is_read_only());
        assert!(!date("Due").def().is_read_only());
    }

    #[test]
    fn columns_lookup_and_reverse_lookup() {
        let columns = Columns::new()
            .column("name", title("Name"))
            .column("points", number("Points").optional());
        assert_eq!(columns.len(), 2);
        assert_eq!(columns.get("points").unwrap().name(), "Points");
        assert_eq!(columns.key_for_name("Name"), Some("name"));
        assert!(matches!(
            columns.get("missing"),
            Err(Error::UnknownColumn { key }) if key == "missing"
        ));
    }
}
