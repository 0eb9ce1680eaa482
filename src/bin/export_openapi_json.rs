use portuguese_tutor::api::openapi_json;

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or("openapi.json".to_string());
    let json = openapi_json()?.replace(r"application/json; charset=utf-8", r"application/json");
    std::fs::write(path, json)?;
    Ok(())
}
