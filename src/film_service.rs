use crate::database::FilmDb;
use crate::error::{Error, Result};
use crate::model::{CatalogEntry, Film, FilmForm, Genre, Mpa};
use crate::validation::validate_film;
use log::{debug, info};
use std::cmp::Ordering;

pub const DEFAULT_POPULAR_COUNT: usize = 10;
pub const DEFAULT_SEARCH_COUNT: usize = 10;

#[derive(Clone)]
pub struct FilmService {
    db: sled::Db,
}

fn into_film(form: FilmForm) -> Result<Film> {
    let violations = validate_film(&form);
    match form {
        FilmForm {
            id,
            name: Some(name),
            description: Some(description),
            release_date: Some(release_date),
            duration: Some(duration),
            rating,
            genres,
        } if violations.is_empty() => Ok(Film {
            id: id.unwrap_or(0),
            name,
            description,
            release_date,
            duration: duration as u32,
            likes: 0,
            rating,
            genres: genres.unwrap_or_default(),
        }),
        _ => Err(Error::Validation(violations)),
    }
}

impl FilmService {
    pub fn new(db: sled::Db) -> Self {
        FilmService { db }
    }

    pub fn add_film(&self, form: FilmForm) -> Result<Film> {
        let film = self.db.insert_film(into_film(form)?)?;
        info!("Added film {} ({})", film.id, film.name);
        Ok(film)
    }

    pub fn update_film(&self, form: FilmForm) -> Result<Film> {
        let film = self.db.replace_film(into_film(form)?)?;
        info!("Updated film {}", film.id);
        Ok(film)
    }

    pub fn get_film_by_id(&self, id: u64) -> Result<Film> {
        debug!("Looking up film {}", id);
        self.db.get_film(id)?.ok_or(Error::FilmNotFound(id))
    }

    pub fn list_films(&self) -> Result<Vec<Film>> {
        self.db.list_films()
    }

    pub fn add_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        self.db.add_like(film_id, user_id)?;
        info!("User {} liked film {}", user_id, film_id);
        Ok(())
    }

    pub fn delete_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        self.db.remove_like(film_id, user_id)?;
        info!("User {} no longer likes film {}", user_id, film_id);
        Ok(())
    }

    /// Films by descending like count. Equal counts keep id order.
    pub fn list_most_popular_films(&self, count: Option<usize>) -> Result<Vec<Film>> {
        let mut films = self.db.list_films()?;
        films.sort_by(|a, b| b.likes.cmp(&a.likes));
        films.truncate(count.unwrap_or(DEFAULT_POPULAR_COUNT));
        Ok(films)
    }

    /// Films whose name or description matches `query`, best match first.
    pub fn search_films(&self, query: &str, count: Option<usize>) -> Result<Vec<Film>> {
        let mut hits = self.db.search_films(query)?;
        hits.sort_by(|(a, a_score), (b, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        debug!("Search {:?} matched {} films", query, hits.len());
        Ok(hits
            .into_iter()
            .take(count.unwrap_or(DEFAULT_SEARCH_COUNT))
            .map(|(film, _)| film)
            .collect())
    }

    pub fn list_genres(&self) -> Vec<CatalogEntry> {
        Genre::ALL.iter().copied().map(CatalogEntry::from).collect()
    }

    pub fn get_genre_by_id(&self, id: u32) -> Result<CatalogEntry> {
        Genre::from_id(id)
            .map(CatalogEntry::from)
            .ok_or(Error::GenreNotFound(id))
    }

    pub fn list_mpa(&self) -> Vec<CatalogEntry> {
        Mpa::ALL.iter().copied().map(CatalogEntry::from).collect()
    }

    pub fn get_mpa_by_id(&self, id: u32) -> Result<CatalogEntry> {
        Mpa::from_id(id)
            .map(CatalogEntry::from)
            .ok_or(Error::MpaNotFound(id))
    }
}
