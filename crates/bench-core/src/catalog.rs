use crate::benchmark::Procedure;
use crate::error::CatalogError;
use model::core::transaction::TransactionType;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Static registry mapping transaction type id ↔ name ↔ procedure,
/// built once at worker construction and immutable afterwards.
pub struct TransactionCatalog {
    entries: BTreeMap<usize, (TransactionType, Arc<dyn Procedure>)>,
    by_name: HashMap<String, usize>,
    by_class: HashMap<TypeId, usize>,
}

impl TransactionCatalog {
    pub fn new(
        procedures: BTreeMap<TransactionType, Arc<dyn Procedure>>,
    ) -> Result<Self, CatalogError> {
        let mut entries = BTreeMap::new();
        let mut by_name = HashMap::new();
        let mut by_class = HashMap::new();

        for (txn_type, procedure) in procedures {
            let id = txn_type.id();
            if by_name
                .insert(txn_type.name().to_string(), id)
                .is_some()
                || entries.contains_key(&id)
            {
                return Err(CatalogError::Duplicate(txn_type.to_string()));
            }
            by_class.insert((procedure.as_ref() as &dyn Any).type_id(), id);
            entries.insert(id, (txn_type, procedure));
        }

        Ok(Self {
            entries,
            by_name,
            by_class,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = &TransactionType> {
        self.entries.values().map(|(t, _)| t)
    }

    /// Primary lookup used by the work loop. A miss here means the
    /// workload mix references a type the benchmark never registered.
    pub fn by_id(&self, id: usize) -> Result<(&TransactionType, &Arc<dyn Procedure>), CatalogError> {
        self.entries
            .get(&id)
            .map(|(t, p)| (t, p))
            .ok_or(CatalogError::IdNotFound(id))
    }

    /// Deprecated: string-based lookup kept only for legacy benchmark
    /// code. New callers use [`by_id`] or [`by_class`].
    pub fn by_name(
        &self,
        name: &str,
    ) -> Result<(&TransactionType, &Arc<dyn Procedure>), CatalogError> {
        let id = self
            .by_name
            .get(name)
            .ok_or_else(|| CatalogError::NameNotFound(name.to_string()))?;
        self.by_id(*id)
    }

    /// Lookup by the concrete procedure type.
    pub fn by_class<P: Procedure>(&self) -> Result<&TransactionType, CatalogError> {
        let id = self
            .by_class
            .get(&TypeId::of::<P>())
            .ok_or(CatalogError::ClassNotFound)?;
        self.by_id(*id).map(|(t, _)| t)
    }
}
