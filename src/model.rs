use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub email: String,
    pub login: String,
    pub name: String,
    pub birthday: NaiveDate,
    pub friends: BTreeSet<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    /// Minutes.
    pub duration: u32,
    /// Number of distinct users in `film_likes` for this film.
    pub likes: u64,
    pub rating: Option<Mpa>,
    pub genres: BTreeSet<Genre>,
}

impl Film {
    /// Text fed to the search index.
    pub fn document(&self) -> String {
        format!("{} {}", self.name, self.description)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Genre {
    Comedy,
    Drama,
    Cartoon,
    Thriller,
    Documentary,
    Action,
}

impl Genre {
    pub const ALL: [Genre; 6] = [
        Genre::Comedy,
        Genre::Drama,
        Genre::Cartoon,
        Genre::Thriller,
        Genre::Documentary,
        Genre::Action,
    ];

    pub fn id(self) -> u32 {
        match self {
            Genre::Comedy => 1,
            Genre::Drama => 2,
            Genre::Cartoon => 3,
            Genre::Thriller => 4,
            Genre::Documentary => 5,
            Genre::Action => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Genre::Comedy => "COMEDY",
            Genre::Drama => "DRAMA",
            Genre::Cartoon => "CARTOON",
            Genre::Thriller => "THRILLER",
            Genre::Documentary => "DOCUMENTARY",
            Genre::Action => "ACTION",
        }
    }

    pub fn from_id(id: u32) -> Option<Genre> {
        Genre::ALL.iter().copied().find(|genre| genre.id() == id)
    }
}

/// Motion Picture Association film rating.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mpa {
    #[serde(rename = "G")]
    G,
    #[serde(rename = "PG")]
    Pg,
    #[serde(rename = "PG-13")]
    Pg13,
    #[serde(rename = "R")]
    R,
    #[serde(rename = "NC-17")]
    Nc17,
}

impl Mpa {
    pub const ALL: [Mpa; 5] = [Mpa::G, Mpa::Pg, Mpa::Pg13, Mpa::R, Mpa::Nc17];

    pub fn id(self) -> u32 {
        match self {
            Mpa::G => 1,
            Mpa::Pg => 2,
            Mpa::Pg13 => 3,
            Mpa::R => 4,
            Mpa::Nc17 => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mpa::G => "G",
            Mpa::Pg => "PG",
            Mpa::Pg13 => "PG-13",
            Mpa::R => "R",
            Mpa::Nc17 => "NC-17",
        }
    }

    pub fn from_id(id: u32) -> Option<Mpa> {
        Mpa::ALL.iter().copied().find(|mpa| mpa.id() == id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: u32,
    pub name: String,
}

impl From<Genre> for CatalogEntry {
    fn from(genre: Genre) -> Self {
        CatalogEntry {
            id: genre.id(),
            name: genre.name().to_owned(),
        }
    }
}

impl From<Mpa> for CatalogEntry {
    fn from(mpa: Mpa) -> Self {
        CatalogEntry {
            id: mpa.id(),
            name: mpa.name().to_owned(),
        }
    }
}

/// Incoming user body. Every field is optional so that a missing field is
/// reported as a violation instead of a deserialization failure.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserForm {
    pub id: Option<u64>,
    pub email: Option<String>,
    pub login: Option<String>,
    pub name: Option<String>,
    pub birthday: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilmForm {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub duration: Option<i64>,
    pub rating: Option<Mpa>,
    pub genres: Option<BTreeSet<Genre>>,
}
