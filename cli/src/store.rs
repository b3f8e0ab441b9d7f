//! SQLite-backed implementation of the core storage traits.

use std::collections::HashSet;
use std::fmt;

use diesel::dsl::{avg, count, count_star};
use diesel::expression_methods::AggregateExpressionMethods;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::upsert::excluded;
use larder_core::{
    store::check_scope, dedupe_records, Ingredient, IngredientStore, MatchMethod, MatchRecord,
    MatchStore, MatchSummary, Scope, SourceKind, StoreError,
};

use crate::db::DbPool;
use crate::models::{IngredientRow, MatchRow, NewIngredient, NewMatch};
use crate::schema::{ingredient_matches, ingredients};

/// Rows per INSERT statement, keeping well under SQLite's bound-parameter limit.
const INSERT_CHUNK: usize = 500;

type Conn = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<Conn, StoreError> {
        self.pool.get().map_err(StoreError::backend)
    }

    /// Stored records of one kind, ordered by source then ingredient.
    pub fn matches(&self, kind: SourceKind) -> Result<Vec<MatchRecord>, StoreError> {
        let mut conn = self.conn()?;
        let rows: Vec<MatchRow> = ingredient_matches::table
            .filter(ingredient_matches::source_kind.eq(kind.as_str()))
            .order((
                ingredient_matches::source_id.asc(),
                ingredient_matches::ingredient_id.asc(),
            ))
            .select(MatchRow::as_select())
            .load(&mut conn)
            .map_err(StoreError::backend)?;

        Ok(rows.into_iter().filter_map(MatchRow::into_record).collect())
    }
}

fn delete_scope(conn: &mut SqliteConnection, scope: &Scope) -> QueryResult<usize> {
    match scope {
        Scope::Entity { kind, source_id } => diesel::delete(
            ingredient_matches::table
                .filter(ingredient_matches::source_kind.eq(kind.as_str()))
                .filter(ingredient_matches::source_id.eq(source_id)),
        )
        .execute(conn),
        Scope::Run { kind } => diesel::delete(
            ingredient_matches::table.filter(ingredient_matches::source_kind.eq(kind.as_str())),
        )
        .execute(conn),
    }
}

/// INSERT OR IGNORE in chunks. Returns the number of rows actually inserted.
fn insert_ignoring(conn: &mut SqliteConnection, records: &[MatchRecord]) -> QueryResult<usize> {
    let mut inserted = 0;
    for chunk in records.chunks(INSERT_CHUNK) {
        let rows: Vec<NewMatch> = chunk.iter().map(NewMatch::from).collect();
        inserted += diesel::insert_or_ignore_into(ingredient_matches::table)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(inserted)
}

impl MatchStore for SqliteStore {
    fn replace_matches(
        &self,
        scope: &Scope,
        records: &[MatchRecord],
    ) -> Result<usize, StoreError> {
        check_scope(scope, records)?;
        let records = dedupe_records(records);

        let mut conn = self.conn()?;
        let result: Result<usize, diesel::result::Error> = conn.transaction(|conn| {
            let deleted = delete_scope(conn, scope)?;
            let inserted = insert_ignoring(conn, &records)?;
            tracing::debug!(?scope, deleted, inserted, "replaced matches");
            Ok(inserted)
        });
        result.map_err(StoreError::backend)
    }

    fn insert_batch(&self, records: &[MatchRecord]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let result: Result<usize, diesel::result::Error> =
            conn.transaction(|conn| insert_ignoring(conn, records));
        result.map_err(StoreError::backend)
    }

    fn upsert_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(ingredient_matches::table)
            .values(NewMatch::from(record))
            .on_conflict((
                ingredient_matches::source_kind,
                ingredient_matches::source_id,
                ingredient_matches::ingredient_id,
            ))
            .do_update()
            .set((
                ingredient_matches::score.eq(excluded(ingredient_matches::score)),
                ingredient_matches::method.eq(excluded(ingredient_matches::method)),
                ingredient_matches::mention.eq(excluded(ingredient_matches::mention)),
            ))
            .execute(&mut conn)
            .map_err(StoreError::backend)?;
        Ok(())
    }

    fn clear(&self, scope: &Scope) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        delete_scope(&mut conn, scope).map_err(StoreError::backend)
    }

    fn summary(&self, kind: SourceKind) -> Result<MatchSummary, StoreError> {
        let mut conn = self.conn()?;

        let (matches, sources, ingredients, average_score): (i64, i64, i64, Option<f64>) =
            ingredient_matches::table
                .filter(ingredient_matches::source_kind.eq(kind.as_str()))
                .select((
                    count_star(),
                    count(ingredient_matches::source_id).aggregate_distinct(),
                    count(ingredient_matches::ingredient_id).aggregate_distinct(),
                    avg(ingredient_matches::score),
                ))
                .get_result(&mut conn)
                .map_err(StoreError::backend)?;

        let exact: i64 = ingredient_matches::table
            .filter(ingredient_matches::source_kind.eq(kind.as_str()))
            .filter(ingredient_matches::method.eq(MatchMethod::Exact.as_str()))
            .count()
            .get_result(&mut conn)
            .map_err(StoreError::backend)?;

        Ok(MatchSummary {
            sources: sources as usize,
            ingredients: ingredients as usize,
            matches: matches as usize,
            exact: exact as usize,
            partial: (matches - exact) as usize,
            average_score,
        })
    }

    fn store_name(&self) -> &'static str {
        "sqlite"
    }
}

impl IngredientStore for SqliteStore {
    fn load_vocabulary(&self, source: Option<&str>) -> Result<Vec<Ingredient>, StoreError> {
        let mut conn = self.conn()?;
        let mut query = ingredients::table
            .select(IngredientRow::as_select())
            .order(ingredients::id.asc())
            .into_boxed();
        if let Some(source) = source {
            query = query.filter(ingredients::source.eq(source));
        }

        let rows: Vec<IngredientRow> = query.load(&mut conn).map_err(StoreError::backend)?;
        Ok(rows.into_iter().map(Ingredient::from).collect())
    }

    fn insert_ingredients(&self, names: &[String], source: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let result: Result<usize, diesel::result::Error> = conn.transaction(|conn| {
            // NOCASE folds ASCII only; compare accented names in Rust.
            let existing: Vec<String> = ingredients::table.select(ingredients::name).load(conn)?;
            let mut seen: HashSet<String> =
                existing.iter().map(|name| name.to_lowercase()).collect();

            let rows: Vec<NewIngredient> = names
                .iter()
                .map(|name| name.trim())
                .filter(|name| !name.is_empty() && seen.insert(name.to_lowercase()))
                .map(|name| NewIngredient { name, source })
                .collect();

            let mut inserted = 0;
            for chunk in rows.chunks(INSERT_CHUNK) {
                inserted += diesel::insert_or_ignore_into(ingredients::table)
                    .values(chunk)
                    .execute(conn)?;
            }
            Ok(inserted)
        });
        result.map_err(StoreError::backend)
    }

    fn backfill_image_url(&self, name: &str, image_url: &str) -> Result<bool, StoreError> {
        let needle = name.trim().to_lowercase();
        let mut conn = self.conn()?;
        let result: Result<bool, diesel::result::Error> = conn.transaction(|conn| {
            let missing: Vec<(i32, String)> = ingredients::table
                .filter(ingredients::image_url.is_null())
                .select((ingredients::id, ingredients::name))
                .order(ingredients::id.asc())
                .load(conn)?;
            let id = match missing
                .into_iter()
                .find(|(_, stored)| stored.to_lowercase() == needle)
            {
                Some((id, _)) => id,
                None => return Ok(false),
            };

            let updated = diesel::update(ingredients::table.find(id))
                .set(ingredients::image_url.eq(image_url))
                .execute(conn)?;
            Ok(updated > 0)
        });
        result.map_err(StoreError::backend)
    }
}
