use crate::error::{Error, Result};
use crate::model::*;
use crate::search::{IndexTx, SearchExt};
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::Transactional;

const USERS: &[u8] = b"users";
const FILMS: &[u8] = b"films";
const FILM_LIKES: &[u8] = b"film_likes";
const FILM_SEARCH: &[u8] = b"film_search";

// Big endian keeps tree iteration in id order.
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&id.as_ref()[..8]);
    u64::from_be_bytes(buf)
}

fn like_key(film_id: u64, user_id: u64) -> Vec<u8> {
    let mut key = serialize_id(film_id).to_vec();
    key.extend_from_slice(&serialize_id(user_id));
    key
}

fn next_id(tree: &sled::Tree) -> Result<u64> {
    match tree.last()? {
        Some((key, _)) => deserialize_id(key)
            .checked_add(1)
            .ok_or(Error::IdsExhausted),
        None => Ok(1),
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

fn decode_all<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>> {
    tree.iter()
        .values()
        .map(|value| decode(&value?))
        .collect()
}

fn tx_encode<T: Serialize>(value: &T) -> ConflictableTransactionResult<Vec<u8>, Error> {
    bincode::serialize(value).map_err(|err| ConflictableTransactionError::Abort(err.into()))
}

fn tx_get<T: DeserializeOwned>(
    tree: &TransactionalTree,
    id: u64,
    missing: fn(u64) -> Error,
) -> ConflictableTransactionResult<T, Error> {
    match tree.get(serialize_id(id))? {
        Some(bytes) => {
            bincode::deserialize(&bytes)
                .map_err(|err| ConflictableTransactionError::Abort(err.into()))
        }
        None => abort(missing(id)),
    }
}

fn tx_put_user(users: &TransactionalTree, user: &User) -> ConflictableTransactionResult<(), Error> {
    users.insert(&serialize_id(user.id)[..], tx_encode(user)?)?;
    Ok(())
}

fn tx_put_film(films: &TransactionalTree, film: &Film) -> ConflictableTransactionResult<(), Error> {
    films.insert(&serialize_id(film.id)[..], tx_encode(film)?)?;
    Ok(())
}

pub trait UserDb {
    /// Stores a new user. The id is kept when it is positive and free,
    /// otherwise the next free id is assigned.
    fn insert_user(&self, user: User) -> Result<User>;
    /// Replaces the stored user with the same id. The stored friend set is kept.
    fn replace_user(&self, user: User) -> Result<User>;
    fn get_user(&self, id: u64) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    fn add_friend(&self, user_id: u64, friend_id: u64) -> Result<()>;
    fn remove_friend(&self, user_id: u64, friend_id: u64) -> Result<()>;
}

impl UserDb for sled::Db {
    fn insert_user(&self, mut user: User) -> Result<User> {
        let users = self.open_tree(USERS)?;
        loop {
            if user.id == 0 || users.contains_key(serialize_id(user.id))? {
                user.id = next_id(&users)?;
            }
            let bytes = bincode::serialize(&user)?;
            if users
                .compare_and_swap(&serialize_id(user.id)[..], None::<&[u8]>, Some(bytes))?
                .is_ok()
            {
                return Ok(user);
            }
        }
    }

    fn replace_user(&self, user: User) -> Result<User> {
        let users = self.open_tree(USERS)?;
        Ok(users.transaction(|users| -> ConflictableTransactionResult<User, Error> {
            let stored: User = tx_get(users, user.id, Error::UserNotFound)?;
            let updated = User {
                friends: stored.friends,
                ..user.clone()
            };
            tx_put_user(users, &updated)?;
            Ok(updated)
        })?)
    }

    fn get_user(&self, id: u64) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        users
            .get(serialize_id(id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn list_users(&self) -> Result<Vec<User>> {
        decode_all(&self.open_tree(USERS)?)
    }

    fn add_friend(&self, user_id: u64, friend_id: u64) -> Result<()> {
        let users = self.open_tree(USERS)?;
        Ok(users.transaction(|users| -> ConflictableTransactionResult<(), Error> {
            let mut user: User = tx_get(users, user_id, Error::UserNotFound)?;
            let mut friend: User = tx_get(users, friend_id, Error::UserNotFound)?;
            if user_id == friend_id {
                return abort(Error::SelfFriendship(user_id));
            }
            user.friends.insert(friend_id);
            friend.friends.insert(user_id);
            tx_put_user(users, &user)?;
            tx_put_user(users, &friend)
        })?)
    }

    fn remove_friend(&self, user_id: u64, friend_id: u64) -> Result<()> {
        let users = self.open_tree(USERS)?;
        Ok(users.transaction(|users| -> ConflictableTransactionResult<(), Error> {
            let mut user: User = tx_get(users, user_id, Error::UserNotFound)?;
            let mut friend: User = tx_get(users, friend_id, Error::UserNotFound)?;
            user.friends.remove(&friend_id);
            friend.friends.remove(&user_id);
            tx_put_user(users, &user)?;
            tx_put_user(users, &friend)
        })?)
    }
}

pub trait FilmDb {
    /// Stores a new film with no likes. Id assignment follows
    /// [`UserDb::insert_user`].
    fn insert_film(&self, film: Film) -> Result<Film>;
    /// Replaces the stored film with the same id. The stored like count is kept.
    fn replace_film(&self, film: Film) -> Result<Film>;
    fn get_film(&self, id: u64) -> Result<Option<Film>>;
    fn list_films(&self) -> Result<Vec<Film>>;
    /// Fails with [`Error::AlreadyLiked`] if the pair is already recorded.
    fn add_like(&self, film_id: u64, user_id: u64) -> Result<()>;
    /// Removing a like that does not exist is a no-op.
    fn remove_like(&self, film_id: u64, user_id: u64) -> Result<()>;
    /// Films matching `query` with their relevance score, unordered.
    fn search_films(&self, query: &str) -> Result<Vec<(Film, f32)>>;
}

impl FilmDb for sled::Db {
    fn insert_film(&self, mut film: Film) -> Result<Film> {
        let films = self.open_tree(FILMS)?;
        let search = self.open_search(FILM_SEARCH)?;
        film.likes = 0;
        loop {
            if film.id == 0 || films.contains_key(serialize_id(film.id))? {
                film.id = next_id(&films)?;
            }
            let inserted = (&films, &search.frequency, &search.tokens, &search.doclen)
                .transaction(
                    |(films, frequency, tokens, doclen)| -> ConflictableTransactionResult<bool, Error> {
                        let key = serialize_id(film.id);
                        if films.get(key)?.is_some() {
                            return Ok(false);
                        }
                        tx_put_film(films, &film)?;
                        IndexTx {
                            frequency,
                            tokens,
                            doclen,
                        }
                        .insert::<Error>(&key, &film.document())?;
                        Ok(true)
                    },
                )?;
            if inserted {
                return Ok(film);
            }
        }
    }

    fn replace_film(&self, film: Film) -> Result<Film> {
        let films = self.open_tree(FILMS)?;
        let search = self.open_search(FILM_SEARCH)?;
        Ok((&films, &search.frequency, &search.tokens, &search.doclen).transaction(
            |(films, frequency, tokens, doclen)| -> ConflictableTransactionResult<Film, Error> {
                let stored: Film = tx_get(films, film.id, Error::FilmNotFound)?;
                let updated = Film {
                    likes: stored.likes,
                    ..film.clone()
                };
                let index = IndexTx {
                    frequency,
                    tokens,
                    doclen,
                };
                let key = serialize_id(film.id);
                index.remove::<Error>(&key, &stored.document())?;
                index.insert::<Error>(&key, &updated.document())?;
                tx_put_film(films, &updated)?;
                Ok(updated)
            },
        )?)
    }

    fn get_film(&self, id: u64) -> Result<Option<Film>> {
        let films = self.open_tree(FILMS)?;
        films
            .get(serialize_id(id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn list_films(&self) -> Result<Vec<Film>> {
        decode_all(&self.open_tree(FILMS)?)
    }

    fn add_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        let users = self.open_tree(USERS)?;
        let films = self.open_tree(FILMS)?;
        let likes = self.open_tree(FILM_LIKES)?;
        Ok((&users, &films, &likes).transaction(
            |(users, films, likes)| -> ConflictableTransactionResult<(), Error> {
                let mut film: Film = tx_get(films, film_id, Error::FilmNotFound)?;
                if users.get(serialize_id(user_id))?.is_none() {
                    return abort(Error::UserNotFound(user_id));
                }
                if likes.insert(like_key(film_id, user_id), Vec::<u8>::new())?.is_some() {
                    return abort(Error::AlreadyLiked { film_id, user_id });
                }
                film.likes += 1;
                tx_put_film(films, &film)
            },
        )?)
    }

    fn remove_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        let users = self.open_tree(USERS)?;
        let films = self.open_tree(FILMS)?;
        let likes = self.open_tree(FILM_LIKES)?;
        Ok((&users, &films, &likes).transaction(
            |(users, films, likes)| -> ConflictableTransactionResult<(), Error> {
                let mut film: Film = tx_get(films, film_id, Error::FilmNotFound)?;
                if users.get(serialize_id(user_id))?.is_none() {
                    return abort(Error::UserNotFound(user_id));
                }
                if likes.remove(like_key(film_id, user_id))?.is_some() {
                    film.likes = film.likes.saturating_sub(1);
                    tx_put_film(films, &film)?;
                }
                Ok(())
            },
        )?)
    }

    fn search_films(&self, query: &str) -> Result<Vec<(Film, f32)>> {
        let search = self.open_search(FILM_SEARCH)?;
        let mut ret = Vec::new();
        for (key, score) in search.query(query)? {
            if let Some(film) = self.get_film(deserialize_id(key))? {
                ret.push((film, score));
            }
        }
        Ok(ret)
    }
}

/// Drops every user, film and like.
#[cfg(test)]
pub fn reset(db: &sled::Db) -> Result<()> {
    for name in &[USERS, FILMS, FILM_LIKES] {
        db.open_tree(name)?.clear()?;
    }
    db.open_search(FILM_SEARCH)?.clear()?;
    Ok(())
}

#[cfg(test)]
pub fn temporary() -> sled::Db {
    sled::Config::new().temporary(true).open().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn user(id: u64) -> User {
        User {
            id,
            email: format!("user{}@example.com", id),
            login: format!("user{}", id),
            name: format!("User {}", id),
            birthday: NaiveDate::from_ymd_opt(2000, 10, 10).unwrap(),
            friends: BTreeSet::new(),
        }
    }

    fn ids(ids: &[u64]) -> BTreeSet<u64> {
        ids.iter().copied().collect()
    }

    fn film(id: u64, name: &str) -> Film {
        Film {
            id,
            name: name.to_owned(),
            description: "Good comedy".to_owned(),
            release_date: NaiveDate::from_ymd_opt(2000, 10, 10).unwrap(),
            duration: 90,
            likes: 0,
            rating: Some(Mpa::Nc17),
            genres: vec![Genre::Comedy].into_iter().collect(),
        }
    }

    #[test]
    fn ids_are_kept_or_assigned() {
        let db = temporary();
        assert_eq!(db.insert_user(user(5)).unwrap().id, 5);
        assert_eq!(db.insert_user(user(5)).unwrap().id, 6);
        assert_eq!(db.insert_user(user(0)).unwrap().id, 7);
        assert_eq!(db.insert_user(user(2)).unwrap().id, 2);
        let listed: Vec<_> = db.list_users().unwrap().iter().map(|u| u.id).collect();
        assert_eq!(listed, vec![2, 5, 6, 7]);
    }

    #[test]
    fn ids_past_the_largest_are_refused() {
        let db = temporary();
        db.insert_user(user(u64::MAX)).unwrap();
        assert!(matches!(db.insert_user(user(0)), Err(Error::IdsExhausted)));
        assert!(matches!(db.insert_user(user(u64::MAX)), Err(Error::IdsExhausted)));
        assert_eq!(db.insert_user(user(3)).unwrap().id, 3);
        assert_eq!(db.list_users().unwrap().len(), 2);

        db.insert_film(film(u64::MAX, "Pulp Fiction")).unwrap();
        assert!(matches!(db.insert_film(film(0, "Fight Club")), Err(Error::IdsExhausted)));
        assert_eq!(db.list_films().unwrap().len(), 1);
    }

    #[test]
    fn large_ids_sort_after_small_ones() {
        let db = temporary();
        db.insert_user(user(256)).unwrap();
        db.insert_user(user(1)).unwrap();
        let listed: Vec<_> = db.list_users().unwrap().iter().map(|u| u.id).collect();
        assert_eq!(listed, vec![1, 256]);
        assert_eq!(db.insert_user(user(0)).unwrap().id, 257);
    }

    #[test]
    fn friendship_is_mutual() {
        let db = temporary();
        db.insert_user(user(1)).unwrap();
        db.insert_user(user(2)).unwrap();
        db.add_friend(1, 2).unwrap();
        db.add_friend(2, 1).unwrap();
        assert_eq!(db.get_user(1).unwrap().unwrap().friends, ids(&[2]));
        assert_eq!(db.get_user(2).unwrap().unwrap().friends, ids(&[1]));

        db.remove_friend(2, 1).unwrap();
        db.remove_friend(2, 1).unwrap();
        assert!(db.get_user(1).unwrap().unwrap().friends.is_empty());
        assert!(db.get_user(2).unwrap().unwrap().friends.is_empty());
    }

    #[test]
    fn failed_friendship_leaves_no_trace() {
        let db = temporary();
        db.insert_user(user(1)).unwrap();
        assert!(matches!(db.add_friend(1, 9999), Err(Error::UserNotFound(9999))));
        assert!(matches!(db.add_friend(9999, 1), Err(Error::UserNotFound(9999))));
        assert!(matches!(db.add_friend(1, 1), Err(Error::SelfFriendship(1))));
        assert!(db.get_user(1).unwrap().unwrap().friends.is_empty());
    }

    #[test]
    fn replace_keeps_friends() {
        let db = temporary();
        db.insert_user(user(1)).unwrap();
        db.insert_user(user(2)).unwrap();
        db.add_friend(1, 2).unwrap();
        let mut changed = user(1);
        changed.login = "egor".to_owned();
        let stored = db.replace_user(changed).unwrap();
        assert_eq!(stored.login, "egor");
        assert_eq!(stored.friends, ids(&[2]));
        assert!(matches!(db.replace_user(user(3)), Err(Error::UserNotFound(3))));
    }

    #[test]
    fn likes_are_counted_once() {
        let db = temporary();
        db.insert_user(user(1)).unwrap();
        db.insert_film(film(1, "All hate Cris")).unwrap();
        db.add_like(1, 1).unwrap();
        assert!(matches!(
            db.add_like(1, 1),
            Err(Error::AlreadyLiked {
                film_id: 1,
                user_id: 1
            })
        ));
        assert_eq!(db.get_film(1).unwrap().unwrap().likes, 1);

        db.remove_like(1, 1).unwrap();
        db.remove_like(1, 1).unwrap();
        assert_eq!(db.get_film(1).unwrap().unwrap().likes, 0);

        assert!(matches!(db.add_like(2, 1), Err(Error::FilmNotFound(2))));
        assert!(matches!(db.add_like(1, 2), Err(Error::UserNotFound(2))));
    }

    #[test]
    fn stored_likes_ignore_caller_count() {
        let db = temporary();
        let mut liked = film(1, "All hate Cris");
        liked.likes = 40;
        assert_eq!(db.insert_film(liked.clone()).unwrap().likes, 0);
        assert_eq!(db.replace_film(liked).unwrap().likes, 0);
    }

    #[test]
    fn search_follows_updates() {
        let db = temporary();
        db.insert_film(film(1, "Pulp Fiction")).unwrap();
        db.insert_film(film(2, "Fight Club")).unwrap();
        let hits = db.search_films("fiction").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, 1);

        db.replace_film(film(1, "Jackie Brown")).unwrap();
        assert!(db.search_films("fiction").unwrap().is_empty());
        assert_eq!(db.search_films("brown").unwrap()[0].0.id, 1);
        assert_eq!(db.search_films("comedy").unwrap().len(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let db = temporary();
        db.insert_user(user(1)).unwrap();
        db.insert_film(film(1, "Pulp Fiction")).unwrap();
        db.add_like(1, 1).unwrap();
        reset(&db).unwrap();
        assert!(db.list_users().unwrap().is_empty());
        assert!(db.list_films().unwrap().is_empty());
        assert!(db.search_films("pulp").unwrap().is_empty());
        db.insert_film(film(1, "Pulp Fiction")).unwrap();
        db.insert_user(user(1)).unwrap();
        db.add_like(1, 1).unwrap();
    }
}
