/// POST /api/chat. The body is read raw so rejected requests still get
/// the envelope-shaped error body instead of axum's default rejection.
async fn post_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TurnEnvelope>, HttpApiError> {
    let request: TurnRequest = serde_json::from_slice(&body).map_err(|err| {
        HttpApiError::validation(
            "request body is not a valid turn request",
            Some(err.to_string()),
        )
    })?;

    let rate_key = rate_key_from_headers(&headers);
    let context = TurnContext {
        rate_key: &rate_key,
        mock_ai: header_flag(&headers, MOCK_AI_HEADER),
        now_ms: unix_now_ms(),
    };

    match state.service.handle_turn(&request, &context) {
        Ok(envelope) => {
            info!(
                rate_key = %rate_key,
                mode = request.chat_mode.as_str(),
                responders = envelope.responders.len(),
                events = envelope.events.len(),
                "turn planned"
            );
            Ok(Json(envelope))
        }
        Err(rejection) => {
            warn!(rate_key = %rate_key, %rejection, "turn refused");
            Err(HttpApiError::from_rejection(rejection))
        }
    }
}
