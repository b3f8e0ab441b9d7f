use chrono::NaiveDateTime;
use diesel::prelude::*;
use larder_core::{Ingredient, MatchMethod, MatchRecord, SourceKind};

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::ingredients)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct IngredientRow {
    pub id: i32,
    pub name: String,
    pub image_url: Option<String>,
    pub source: String,
    #[allow(dead_code)]
    pub created_at: NaiveDateTime,
}

impl From<IngredientRow> for Ingredient {
    fn from(row: IngredientRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image_url: row.image_url,
            source: row.source,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::ingredients)]
pub struct NewIngredient<'a> {
    pub name: &'a str,
    pub source: &'a str,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::ingredient_matches)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MatchRow {
    pub source_kind: String,
    pub source_id: String,
    pub ingredient_id: i32,
    pub score: f64,
    pub method: String,
    pub mention: String,
    #[allow(dead_code)]
    pub created_at: NaiveDateTime,
}

impl MatchRow {
    /// `None` for rows whose kind or method this build does not know.
    pub fn into_record(self) -> Option<MatchRecord> {
        Some(MatchRecord {
            kind: SourceKind::from_str(&self.source_kind)?,
            source_id: self.source_id,
            ingredient_id: self.ingredient_id,
            score: self.score,
            method: MatchMethod::from_str(&self.method)?,
            mention: self.mention,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::ingredient_matches)]
pub struct NewMatch<'a> {
    pub source_kind: &'a str,
    pub source_id: &'a str,
    pub ingredient_id: i32,
    pub score: f64,
    pub method: &'a str,
    pub mention: &'a str,
}

impl<'a> From<&'a MatchRecord> for NewMatch<'a> {
    fn from(record: &'a MatchRecord) -> Self {
        Self {
            source_kind: record.kind.as_str(),
            source_id: &record.source_id,
            ingredient_id: record.ingredient_id,
            score: record.score,
            method: record.method.as_str(),
            mention: &record.mention,
        }
    }
}
