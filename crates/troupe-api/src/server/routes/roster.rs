#[derive(Debug, Serialize)]
struct RosterResponse {
    schema_version: String,
    characters: Vec<Character>,
}

async fn get_roster(State(state): State<AppState>) -> Json<RosterResponse> {
    Json(RosterResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        characters: state.service.roster().characters().to_vec(),
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    schema_version: String,
    status: &'static str,
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        status: "ok",
    })
}
