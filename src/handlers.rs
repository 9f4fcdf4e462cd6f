use crate::error::Result;
use crate::film_service::FilmService;
use crate::model::{FilmForm, UserForm};
use crate::user_service::UserService;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

type Users = web::Data<UserService>;
type Films = web::Data<FilmService>;

#[derive(Deserialize)]
struct CountParams {
    count: Option<usize>,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
    count: Option<usize>,
}

async fn add_user(users: Users, form: web::Json<UserForm>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(users.add_user(form.into_inner())?))
}

async fn update_user(users: Users, form: web::Json<UserForm>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(users.update_user(form.into_inner())?))
}

async fn list_users(users: Users) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(users.list_users()?))
}

async fn get_user(users: Users, id: web::Path<u64>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(users.get_user_by_id(id.into_inner())?))
}

async fn add_friend(users: Users, path: web::Path<(u64, u64)>) -> Result<HttpResponse> {
    let (id, friend_id) = path.into_inner();
    users.add_friend(id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn delete_friend(users: Users, path: web::Path<(u64, u64)>) -> Result<HttpResponse> {
    let (id, friend_id) = path.into_inner();
    users.delete_friend(id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn list_friends(users: Users, id: web::Path<u64>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(users.list_user_friends(id.into_inner())?))
}

async fn list_common_friends(users: Users, path: web::Path<(u64, u64)>) -> Result<HttpResponse> {
    let (id, other_id) = path.into_inner();
    Ok(HttpResponse::Ok().json(users.list_common_friends(id, other_id)?))
}

async fn add_film(films: Films, form: web::Json<FilmForm>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(films.add_film(form.into_inner())?))
}

async fn update_film(films: Films, form: web::Json<FilmForm>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(films.update_film(form.into_inner())?))
}

async fn list_films(films: Films) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(films.list_films()?))
}

async fn get_film(films: Films, id: web::Path<u64>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(films.get_film_by_id(id.into_inner())?))
}

async fn add_like(films: Films, path: web::Path<(u64, u64)>) -> Result<HttpResponse> {
    let (id, user_id) = path.into_inner();
    films.add_like(id, user_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn delete_like(films: Films, path: web::Path<(u64, u64)>) -> Result<HttpResponse> {
    let (id, user_id) = path.into_inner();
    films.delete_like(id, user_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn popular_films(films: Films, params: web::Query<CountParams>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(films.list_most_popular_films(params.count)?))
}

async fn search_films(films: Films, params: web::Query<SearchParams>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(films.search_films(&params.query, params.count)?))
}

async fn list_genres(films: Films) -> HttpResponse {
    HttpResponse::Ok().json(films.list_genres())
}

async fn get_genre(films: Films, id: web::Path<u32>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(films.get_genre_by_id(id.into_inner())?))
}

async fn list_mpa(films: Films) -> HttpResponse {
    HttpResponse::Ok().json(films.list_mpa())
}

async fn get_mpa(films: Films, id: web::Path<u32>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(films.get_mpa_by_id(id.into_inner())?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/users")
            .route(web::post().to(add_user))
            .route(web::put().to(update_user))
            .route(web::get().to(list_users)),
    )
    .route("/users/{id}", web::get().to(get_user))
    .route("/users/{id}/friends", web::get().to(list_friends))
    .route(
        "/users/{id}/friends/common/{other_id}",
        web::get().to(list_common_friends),
    )
    .route("/users/{id}/friends/{friend_id}", web::put().to(add_friend))
    .route(
        "/users/{id}/friends/{friend_id}",
        web::delete().to(delete_friend),
    )
    .service(
        web::resource("/films")
            .route(web::post().to(add_film))
            .route(web::put().to(update_film))
            .route(web::get().to(list_films)),
    )
    // Before /films/{id} so that the literal segments win.
    .route("/films/popular", web::get().to(popular_films))
    .route("/films/search", web::get().to(search_films))
    .route("/films/{id}", web::get().to(get_film))
    .route("/films/{id}/like/{user_id}", web::put().to(add_like))
    .route("/films/{id}/like/{user_id}", web::delete().to(delete_like))
    .route("/genres", web::get().to(list_genres))
    .route("/genres/{id}", web::get().to(get_genre))
    .route("/mpa", web::get().to(list_mpa))
    .route("/mpa/{id}", web::get().to(get_mpa));
}
