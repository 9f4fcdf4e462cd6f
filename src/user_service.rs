use crate::database::UserDb;
use crate::error::{Error, Result};
use crate::model::{User, UserForm};
use crate::validation::validate_user;
use chrono::{Local, NaiveDate};
use log::{debug, info};
use std::collections::BTreeSet;

#[derive(Clone)]
pub struct UserService {
    db: sled::Db,
}

/// Validates the form and builds the record it describes. A blank or absent
/// name falls back to the login.
fn into_user(form: UserForm, today: NaiveDate) -> Result<User> {
    let violations = validate_user(&form, today);
    match form {
        UserForm {
            id,
            email: Some(email),
            login: Some(login),
            name,
            birthday: Some(birthday),
        } if violations.is_empty() => {
            let name = match name {
                Some(name) if !name.trim().is_empty() => name,
                _ => login.clone(),
            };
            Ok(User {
                id: id.unwrap_or(0),
                email,
                login,
                name,
                birthday,
                friends: BTreeSet::new(),
            })
        }
        _ => Err(Error::Validation(violations)),
    }
}

impl UserService {
    pub fn new(db: sled::Db) -> Self {
        UserService { db }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    pub fn add_user(&self, form: UserForm) -> Result<User> {
        let user = self.db.insert_user(into_user(form, Self::today())?)?;
        info!("Added user {} ({})", user.id, user.login);
        Ok(user)
    }

    pub fn update_user(&self, form: UserForm) -> Result<User> {
        let user = into_user(form, Self::today())?;
        let user = self.db.replace_user(user)?;
        info!("Updated user {}", user.id);
        Ok(user)
    }

    pub fn get_user_by_id(&self, id: u64) -> Result<User> {
        debug!("Looking up user {}", id);
        self.db.get_user(id)?.ok_or(Error::UserNotFound(id))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    pub fn add_friend(&self, user_id: u64, friend_id: u64) -> Result<()> {
        self.db.add_friend(user_id, friend_id)?;
        info!("Users {} and {} are now friends", user_id, friend_id);
        Ok(())
    }

    pub fn delete_friend(&self, user_id: u64, friend_id: u64) -> Result<()> {
        self.db.remove_friend(user_id, friend_id)?;
        info!("Users {} and {} are no longer friends", user_id, friend_id);
        Ok(())
    }

    pub fn list_user_friends(&self, user_id: u64) -> Result<Vec<User>> {
        let user = self.get_user_by_id(user_id)?;
        self.resolve(&user.friends)
    }

    pub fn list_common_friends(&self, user_id: u64, other_id: u64) -> Result<Vec<User>> {
        let user = self.get_user_by_id(user_id)?;
        let other = self.get_user_by_id(other_id)?;
        let common = user
            .friends
            .intersection(&other.friends)
            .copied()
            .collect::<BTreeSet<_>>();
        self.resolve(&common)
    }

    fn resolve(&self, ids: &BTreeSet<u64>) -> Result<Vec<User>> {
        ids.iter()
            .map(|id| self.get_user_by_id(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::temporary;

    fn form(id: u64, login: &str) -> UserForm {
        UserForm {
            id: Some(id),
            email: Some(format!("{}@yandex.ru", login)),
            login: Some(login.to_owned()),
            name: Some(format!("{} name", login)),
            birthday: NaiveDate::from_ymd_opt(2000, 10, 10),
        }
    }

    fn service_with_users(count: u64) -> UserService {
        let service = UserService::new(temporary());
        for id in 1..=count {
            service.add_user(form(id, &format!("user{}", id))).unwrap();
        }
        service
    }

    fn ids(users: &[User]) -> Vec<u64> {
        users.iter().map(|u| u.id).collect()
    }

    #[test]
    fn add_then_get_returns_same_record() {
        let service = UserService::new(temporary());
        let added = service.add_user(form(1, "alex")).unwrap();
        let stored = service.get_user_by_id(1).unwrap();
        assert_eq!(added, stored);
        assert_eq!(stored.email, "alex@yandex.ru");
        assert_eq!(stored.name, "alex name");
        assert!(stored.friends.is_empty());
    }

    #[test]
    fn blank_name_defaults_to_login() {
        let service = UserService::new(temporary());
        for (id, name) in vec![(1, None), (2, Some("")), (3, Some("  "))] {
            let user = service
                .add_user(UserForm {
                    name: name.map(str::to_owned),
                    ..form(id, "alex")
                })
                .unwrap();
            assert_eq!(user.name, "alex");
        }

        let updated = service
            .update_user(UserForm {
                name: None,
                ..form(1, "egor")
            })
            .unwrap();
        assert_eq!(updated.name, "egor");
        assert_eq!(service.get_user_by_id(1).unwrap().name, "egor");
    }

    #[test]
    fn invalid_user_is_not_stored() {
        let service = UserService::new(temporary());
        let err = service
            .add_user(UserForm {
                login: Some("Alex Alex".to_owned()),
                ..form(1, "alex")
            })
            .unwrap_err();
        match err {
            Error::Validation(violations) => assert_eq!(violations[0].field, "login"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(service.list_users().unwrap().is_empty());
    }

    #[test]
    fn duplicate_id_gets_a_new_one() {
        let service = UserService::new(temporary());
        service.add_user(form(1, "alex")).unwrap();
        let second = service.add_user(form(1, "egor")).unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(service.list_users().unwrap().len(), 2);
    }

    #[test]
    fn update_unknown_user_fails_without_change() {
        let service = service_with_users(1);
        let before = service.list_users().unwrap();
        assert!(matches!(
            service.update_user(form(10000, "egor")),
            Err(Error::UserNotFound(10000))
        ));
        assert_eq!(service.list_users().unwrap(), before);
    }

    #[test]
    fn get_unknown_user_fails() {
        let service = service_with_users(1);
        let err = service.get_user_by_id(9999).unwrap_err();
        assert_eq!(err.to_string(), "user with id 9999 not found");
    }

    #[test]
    fn friends_are_listed_for_both_sides() {
        let service = service_with_users(3);
        service.add_friend(1, 2).unwrap();
        service.add_friend(1, 3).unwrap();
        assert_eq!(ids(&service.list_user_friends(1).unwrap()), vec![2, 3]);
        assert_eq!(ids(&service.list_user_friends(2).unwrap()), vec![1]);
        assert_eq!(ids(&service.list_user_friends(3).unwrap()), vec![1]);

        let friend = &service.list_user_friends(2).unwrap()[0];
        assert_eq!(friend, &service.get_user_by_id(1).unwrap());
    }

    #[test]
    fn adding_a_friend_twice_keeps_one_entry() {
        let service = service_with_users(2);
        service.add_friend(1, 2).unwrap();
        service.add_friend(1, 2).unwrap();
        service.add_friend(2, 1).unwrap();
        assert_eq!(service.get_user_by_id(1).unwrap().friends.len(), 1);
        assert_eq!(service.get_user_by_id(2).unwrap().friends.len(), 1);
    }

    #[test]
    fn friend_operations_require_both_users() {
        let service = service_with_users(1);
        assert!(matches!(service.add_friend(1, 9999), Err(Error::UserNotFound(9999))));
        assert!(matches!(service.add_friend(9999, 1), Err(Error::UserNotFound(9999))));
        assert!(matches!(service.delete_friend(1, 9999), Err(Error::UserNotFound(9999))));
        assert!(matches!(service.list_user_friends(9999), Err(Error::UserNotFound(9999))));
        assert!(matches!(
            service.list_common_friends(1, 9999),
            Err(Error::UserNotFound(9999))
        ));
        assert!(matches!(
            service.list_common_friends(9999, 1),
            Err(Error::UserNotFound(9999))
        ));
    }

    #[test]
    fn delete_friend_is_symmetric_and_idempotent() {
        let service = service_with_users(3);
        service.add_friend(1, 2).unwrap();
        service.add_friend(1, 3).unwrap();
        service.delete_friend(2, 1).unwrap();
        assert_eq!(ids(&service.list_user_friends(1).unwrap()), vec![3]);
        assert!(service.list_user_friends(2).unwrap().is_empty());

        service.delete_friend(2, 1).unwrap();
        service.delete_friend(2, 3).unwrap();
        assert_eq!(ids(&service.list_user_friends(3).unwrap()), vec![1]);
    }

    #[test]
    fn common_friends_are_the_intersection() {
        let service = service_with_users(5);
        service.add_friend(1, 3).unwrap();
        service.add_friend(1, 4).unwrap();
        service.add_friend(1, 5).unwrap();
        service.add_friend(2, 4).unwrap();
        service.add_friend(2, 5).unwrap();
        assert_eq!(ids(&service.list_common_friends(1, 2).unwrap()), vec![4, 5]);
        assert_eq!(ids(&service.list_common_friends(2, 1).unwrap()), vec![4, 5]);
        assert_eq!(ids(&service.list_common_friends(3, 4).unwrap()), vec![1]);
    }

    #[test]
    fn no_common_friends_is_empty() {
        let service = service_with_users(3);
        service.add_friend(1, 3).unwrap();
        assert!(service.list_common_friends(1, 2).unwrap().is_empty());
        assert!(service.list_common_friends(1, 3).unwrap().is_empty());
    }
}
