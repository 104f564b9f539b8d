//! Fixture entity types.
//!
//! One entity per store flavour, with field tables and index mappings the
//! integration tests share.

use dualstore_codec::{FieldKind, Value};
use dualstore_core::{
    identity_eq, new_row, ChildRecords, ChildSet, ChildTable, CoreError, CoreResult, Dated,
    DatedFields, Dictionary, DictionaryFields, Entity, EntityId, FieldMapping, FieldTable,
    IndexMapping, NestedMapping, RecordCodec, RowView,
};
use dualstore_index::IndexDocument;
use dualstore_storage::Row;
use std::collections::BTreeSet;

/// A dictionary entry: a maker of packages.
#[derive(Debug, Clone)]
pub struct Producer {
    /// Identity.
    pub id: EntityId,
    /// Name, order and active flag.
    pub entry: DictionaryFields,
    /// Timestamps.
    pub dates: DatedFields,
    /// Short code.
    pub code: String,
}

identity_eq!(Producer);

impl Producer {
    /// An active producer at position zero.
    pub fn new(id: &str, name: &str, code: &str) -> Self {
        Self {
            id: EntityId::from(id),
            entry: DictionaryFields::new(name),
            dates: DatedFields::default(),
            code: code.to_string(),
        }
    }

    /// Field table of producers.
    pub fn fields() -> FieldTable {
        FieldTable::dictionary().field("code", FieldKind::Keyword)
    }
}

impl Entity for Producer {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

impl RecordCodec for Producer {
    fn entity_type() -> &'static str {
        "producer"
    }

    fn encode(&self) -> Row {
        let mut row = new_row(&self.id);
        self.entry.write(&mut row);
        self.dates.write(&mut row);
        row.insert("code".into(), Value::from(self.code.as_str()));
        row
    }

    fn decode(row: &Row, _children: &ChildRecords) -> CoreResult<Self> {
        let view = RowView::new("producer", row);
        Ok(Self {
            id: view.id()?,
            entry: DictionaryFields::read(&view)?,
            dates: DatedFields::read(&view)?,
            code: view.text("code")?,
        })
    }
}

impl Dated for Producer {
    fn dated(&self) -> &DatedFields {
        &self.dates
    }

    fn dated_mut(&mut self) -> &mut DatedFields {
        &mut self.dates
    }
}

impl Dictionary for Producer {
    fn dictionary(&self) -> &DictionaryFields {
        &self.entry
    }
}

/// Adds a `display` keyword of the form `name (code)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProducerMapping;

impl IndexMapping<Producer> for ProducerMapping {
    fn index_type(&self) -> &str {
        "producer"
    }

    fn extra_fields(&self) -> Vec<(String, FieldKind)> {
        vec![("display".into(), FieldKind::Keyword)]
    }

    fn to_index_document(&self, entity: &Producer, document: &mut IndexDocument) -> CoreResult<()> {
        document.set("display", format!("{} ({})", entity.entry.name, entity.code));
        Ok(())
    }
}

/// Child table of package tasks.
pub const TASK_TABLE: ChildTable = ChildTable {
    table: "task",
    foreign_key: "package_id",
};

/// A step of a package, stored in [`TASK_TABLE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Identity, unique across packages.
    pub id: EntityId,
    /// Workflow state such as `open` or `done`.
    pub state: String,
    /// Free label.
    pub label: String,
}

/// A dated record owning tasks.
#[derive(Debug, Clone)]
pub struct Package {
    /// Identity.
    pub id: EntityId,
    /// Timestamps.
    pub dates: DatedFields,
    /// Full-text title.
    pub title: String,
    /// Ordering weight.
    pub priority: i64,
    /// Owned tasks.
    pub tasks: Vec<Task>,
}

identity_eq!(Package);

impl Package {
    /// A package without tasks.
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: EntityId::from(id),
            dates: DatedFields::default(),
            title: title.to_string(),
            priority: 0,
            tasks: Vec::new(),
        }
    }

    /// Sets the priority.
    #[must_use]
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Appends a task with id `<package id>-t<n>`.
    #[must_use]
    pub fn task(mut self, state: &str, label: &str) -> Self {
        let id = EntityId::from(format!("{}-t{:02}", self.id, self.tasks.len()));
        self.tasks.push(Task {
            id,
            state: state.to_string(),
            label: label.to_string(),
        });
        self
    }

    /// Field table of packages, with tasks nested under `tasks`.
    pub fn fields() -> FieldTable {
        FieldTable::dated()
            .mapping("title", FieldMapping::text_with_copies("title"))
            .field("priority", FieldKind::Integer)
            .nested(
                "tasks",
                NestedMapping::new(
                    TASK_TABLE.table,
                    TASK_TABLE.foreign_key,
                    "task",
                    FieldTable::identity()
                        .field("state", FieldKind::Keyword)
                        .field("label", FieldKind::Keyword),
                ),
            )
    }
}

impl Entity for Package {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

impl RecordCodec for Package {
    fn entity_type() -> &'static str {
        "package"
    }

    fn encode(&self) -> Row {
        let mut row = new_row(&self.id);
        row.insert("title".into(), Value::from(self.title.as_str()));
        row.insert("priority".into(), Value::Integer(self.priority));
        self.dates.write(&mut row);
        row
    }

    fn decode(row: &Row, children: &ChildRecords) -> CoreResult<Self> {
        let view = RowView::new("package", row);
        let mut tasks = Vec::new();
        for task in children.get(TASK_TABLE.table).into_iter().flatten() {
            let task = RowView::new("task", task);
            tasks.push(Task {
                id: task.id()?,
                state: task.text("state")?,
                label: task.text("label")?,
            });
        }
        Ok(Self {
            id: view.id()?,
            dates: DatedFields::read(&view)?,
            title: view.text("title")?,
            priority: view.integer("priority")?,
            tasks,
        })
    }

    fn child_tables() -> Vec<ChildTable> {
        vec![TASK_TABLE]
    }

    fn child_sets(&self) -> Vec<ChildSet> {
        let rows = self
            .tasks
            .iter()
            .map(|task| {
                let mut row = new_row(&task.id);
                row.insert("state".into(), Value::from(task.state.as_str()));
                row.insert("label".into(), Value::from(task.label.as_str()));
                row
            })
            .collect();
        vec![ChildSet {
            table: TASK_TABLE,
            rows,
        }]
    }
}

impl Dated for Package {
    fn dated(&self) -> &DatedFields {
        &self.dates
    }

    fn dated_mut(&mut self) -> &mut DatedFields {
        &mut self.dates
    }
}

/// Adds a `task_count` integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageMapping;

impl IndexMapping<Package> for PackageMapping {
    fn index_type(&self) -> &str {
        "package"
    }

    fn extra_fields(&self) -> Vec<(String, FieldKind)> {
        vec![("task_count".into(), FieldKind::Integer)]
    }

    fn to_index_document(&self, entity: &Package, document: &mut IndexDocument) -> CoreResult<()> {
        document.set("task_count", entity.tasks.len() as i64);
        Ok(())
    }
}

/// A plain record without timestamps.
#[derive(Debug, Clone)]
pub struct Tag {
    /// Identity.
    pub id: EntityId,
    /// Keyword label.
    pub label: String,
    /// Integer weight.
    pub weight: i64,
}

identity_eq!(Tag);

impl Tag {
    /// Creates a tag.
    pub fn new(id: &str, label: &str, weight: i64) -> Self {
        Self {
            id: EntityId::from(id),
            label: label.to_string(),
            weight,
        }
    }

    /// Field table of tags.
    pub fn fields() -> FieldTable {
        FieldTable::identity()
            .field("label", FieldKind::Keyword)
            .field("weight", FieldKind::Integer)
    }
}

impl Entity for Tag {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

impl RecordCodec for Tag {
    fn entity_type() -> &'static str {
        "tag"
    }

    fn encode(&self) -> Row {
        let mut row = new_row(&self.id);
        row.insert("label".into(), Value::from(self.label.as_str()));
        row.insert("weight".into(), Value::Integer(self.weight));
        row
    }

    fn decode(row: &Row, _children: &ChildRecords) -> CoreResult<Self> {
        let view = RowView::new("tag", row);
        Ok(Self {
            id: view.id()?,
            label: view.text("label")?,
            weight: view.integer("weight")?,
        })
    }
}

/// Wraps a mapping and fails the projection of chosen entities, the way a
/// mapping bug hits only some records.
#[derive(Debug, Clone)]
pub struct PoisonedMapping<M> {
    inner: M,
    poisoned: BTreeSet<EntityId>,
}

impl<M> PoisonedMapping<M> {
    /// Fails the projection of every id in `poisoned`.
    pub fn new(inner: M, poisoned: &[&str]) -> Self {
        Self {
            inner,
            poisoned: poisoned.iter().map(|id| EntityId::from(*id)).collect(),
        }
    }
}

impl<T: Entity, M: IndexMapping<T>> IndexMapping<T> for PoisonedMapping<M> {
    fn index_type(&self) -> &str {
        self.inner.index_type()
    }

    fn collection(&self) -> &str {
        self.inner.collection()
    }

    fn extra_fields(&self) -> Vec<(String, FieldKind)> {
        self.inner.extra_fields()
    }

    fn to_index_document(&self, entity: &T, document: &mut IndexDocument) -> CoreResult<()> {
        if self.poisoned.contains(entity.id()) {
            return Err(CoreError::configuration(format!(
                "cannot project {} {}",
                self.inner.index_type(),
                entity.id()
            )));
        }
        self.inner.to_index_document(entity, document)
    }
}
