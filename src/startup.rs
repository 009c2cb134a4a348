use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{CredentialVerifier, TokenAuthority};
use crate::middleware::JwtMiddleware;
use crate::routes::{get_current_user, health_check, login, refresh, register};
use crate::users::UserStore;

pub fn run(
    listener: TcpListener,
    store: Arc<dyn UserStore>,
    authority: TokenAuthority,
    verifier: CredentialVerifier,
) -> Result<Server, std::io::Error> {
    let store: web::Data<dyn UserStore> = web::Data::from(store);
    let authority_data = web::Data::new(authority.clone());
    let verifier_data = web::Data::new(verifier);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())

            // Shared state
            .app_data(store.clone())
            .app_data(authority_data.clone())
            .app_data(verifier_data.clone())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))

            // Protected routes (require an access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(authority.clone()))
                    .route("/me", web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
