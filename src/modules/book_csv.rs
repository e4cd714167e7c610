//! Flat CSV shape of a catalog entry, used by import and export.
//!
//! Spreadsheets exported by the old school system use Indonesian column
//! names; those are accepted as aliases on import.

use serde::{Deserialize, Serialize};

use crate::domain::BookInput;
use crate::models::book::{self, CoverType};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    #[serde(alias = "judul")]
    pub title: String,
    #[serde(default, alias = "penulis")]
    pub author: Option<String>,
    #[serde(default, alias = "penerbit")]
    pub publisher: Option<String>,
    #[serde(
        default,
        alias = "tahun_terbit",
        deserialize_with = "csv::invalid_option"
    )]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default, alias = "eksemplar", deserialize_with = "csv::invalid_option")]
    pub total_copies: Option<i32>,
    #[serde(
        default,
        alias = "ketersediaan",
        deserialize_with = "csv::invalid_option"
    )]
    pub available_copies: Option<i32>,
    #[serde(default, alias = "no_panggil")]
    pub call_number: Option<String>,
    #[serde(default, alias = "asal_koleksi")]
    pub collection_origin: Option<String>,
    #[serde(default, alias = "kota_terbit")]
    pub publication_city: Option<String>,
    #[serde(default, alias = "lokasi")]
    pub location: Option<String>,
    #[serde(default, alias = "deskripsi")]
    pub description: Option<String>,
    #[serde(default, alias = "kategori")]
    pub category: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub cover_type: Option<String>,
}

impl BookRecord {
    /// Unknown cover types fall back to a URL when the value looks like
    /// one, otherwise to an uploaded file name.
    fn parsed_cover_type(&self) -> Option<CoverType> {
        let cover = self.cover.as_deref().filter(|c| !c.trim().is_empty())?;
        Some(
            match self.cover_type.as_deref().map(|t| t.trim().to_ascii_lowercase()) {
                Some(t) if t == "url" => CoverType::Url,
                Some(t) if t == "upload" => CoverType::Upload,
                _ if cover.starts_with("http://") || cover.starts_with("https://") => {
                    CoverType::Url
                }
                _ => CoverType::Upload,
            },
        )
    }

    pub fn into_input(self) -> BookInput {
        let cover_type = self.parsed_cover_type();
        let total = self.total_copies.unwrap_or(0);
        BookInput {
            available_copies: Some(self.available_copies.unwrap_or(total)),
            total_copies: Some(total),
            cover_type,
            title: self.title,
            author: self.author,
            publisher: self.publisher,
            publication_year: self.publication_year,
            isbn: self.isbn,
            call_number: self.call_number,
            collection_origin: self.collection_origin,
            publication_city: self.publication_city,
            location: self.location,
            description: self.description,
            category: self.category,
            cover: self.cover,
        }
    }
}

impl From<book::Model> for BookRecord {
    fn from(model: book::Model) -> Self {
        Self {
            cover_type: model.cover.as_ref().map(|_| {
                match model.cover_type {
                    CoverType::Upload => "upload",
                    CoverType::Url => "url",
                }
                .to_string()
            }),
            title: model.title,
            author: model.author,
            publisher: model.publisher,
            publication_year: model.publication_year,
            isbn: model.isbn,
            total_copies: Some(model.total_copies),
            available_copies: Some(model.available_copies),
            call_number: model.call_number,
            collection_origin: model.collection_origin,
            publication_city: model.publication_city,
            location: model.location,
            description: model.description,
            category: model.category,
            cover: model.cover,
        }
    }
}

/// A row that could not be read, with its 1-based line number.
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    pub line: u64,
    pub message: String,
}

/// Parses every row, collecting bad rows instead of failing the file.
/// Records come back with their 1-based line number.
pub fn parse_books_csv(
    content: &[u8],
) -> Result<(Vec<(u64, BookRecord)>, Vec<RowError>), String> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content);

    let headers = rdr
        .headers()
        .map_err(|e| format!("CSV header error: {}", e))?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase().replace(' ', "_"))
        .collect::<csv::StringRecord>();

    let mut records = Vec::new();
    let mut errors = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                errors.push(RowError {
                    line: e.position().map(|p| p.line()).unwrap_or(fallback_line),
                    message: e.to_string(),
                });
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(fallback_line);
        match row.deserialize::<BookRecord>(Some(&headers)) {
            Ok(record) if record.title.trim().is_empty() => errors.push(RowError {
                line,
                message: "title is required".to_string(),
            }),
            Ok(record) => records.push((line, record)),
            Err(e) => errors.push(RowError {
                line,
                message: e.to_string(),
            }),
        }
    }

    Ok((records, errors))
}

pub fn write_books_csv(books: impl IntoIterator<Item = book::Model>) -> Result<Vec<u8>, String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for book in books {
        wtr.serialize(BookRecord::from(book))
            .map_err(|e| format!("CSV write error: {}", e))?;
    }
    wtr.into_inner()
        .map_err(|e| format!("CSV write error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indonesian_headers_are_accepted() {
        let data = "Judul,Penulis,Tahun Terbit,Eksemplar,Ketersediaan,Kategori\n\
                    Laskar Pelangi,Andrea Hirata,2005,4,,\"fiksi, novel\"\n";
        let (records, errors) = parse_books_csv(data.as_bytes()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(records.len(), 1);

        assert_eq!(records[0].0, 2);
        let input = records[0].1.clone().into_input();
        assert_eq!(input.title, "Laskar Pelangi");
        assert_eq!(input.author.as_deref(), Some("Andrea Hirata"));
        assert_eq!(input.publication_year, Some(2005));
        assert_eq!(input.total_copies, Some(4));
        // empty availability means every copy is on the shelf
        assert_eq!(input.available_copies, Some(4));
    }

    #[test]
    fn bad_numbers_become_empty_and_missing_titles_are_reported() {
        let data = "title,total_copies,publication_year\n\
                    Bumi,three,20xx\n\
                    ,2,2001\n";
        let (records, errors) = parse_books_csv(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.total_copies, None);
        assert_eq!(records[0].1.publication_year, None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 3);
    }

    #[test]
    fn cover_type_is_inferred_from_the_value() {
        let record = BookRecord {
            title: "x".into(),
            cover: Some("https://img.example/x.jpg".into()),
            ..Default::default()
        };
        assert_eq!(record.into_input().cover_type, Some(CoverType::Url));

        let record = BookRecord {
            title: "x".into(),
            ..Default::default()
        };
        assert_eq!(record.into_input().cover_type, None);
    }
}
