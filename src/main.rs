#[rocket::launch]
async fn rocket() -> _ {
    match diploma_registry::build().await {
        Ok(rocket) => rocket,
        Err(e) => {
            eprintln!("Failed to start diploma registry: {}", e);
            std::process::exit(1);
        }
    }
}
