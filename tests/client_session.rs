use bodigital::{
    app::build_router,
    client::ApiClient,
    config::{Config, StorageBackend},
    kv::KvStore,
    resolver::{AuthResolver, RemoteLogin},
    roster::CredentialRoster,
    runtime,
    session::{DurableStorage, SessionContext},
};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

const TIMEOUT: Duration = Duration::from_secs(2);

async fn memory_fixtures() -> (Arc<dyn DurableStorage>, CredentialRoster, SessionContext) {
    let storage: Arc<dyn DurableStorage> = Arc::new(KvStore::memory());
    let roster = CredentialRoster::load(storage.clone(), 4)
        .await
        .expect("roster");
    let session = SessionContext::restore(storage.clone())
        .await
        .expect("session");
    (storage, roster, session)
}

async fn file_storage(dir: &TempDir) -> Arc<dyn DurableStorage> {
    let mut cfg = Config::in_memory();
    cfg.storage_backend = StorageBackend::File;
    cfg.data_dir = dir.path().to_path_buf();
    Arc::new(KvStore::from_config(&cfg).await.expect("kv"))
}

#[tokio::test]
async fn remote_login_wins_when_server_accepts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(header("authorization", "Bearer demo-anon-key"))
        .and(body_json(json!({"matricula": "PN001234", "password": "segredo"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "server-token",
            "policial": {
                "id": "srv-1",
                "nome": "Comandante João Silva Muana",
                "posto": "Comandante",
                "matricula": "PN001234"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_, roster, mut session) = memory_fixtures().await;
    let remote = RemoteLogin::new(&format!("{}/api", server.uri()), TIMEOUT).expect("remote");
    AuthResolver::new(Some(remote))
        .login(&roster, &mut session, "PN001234", "segredo")
        .await
        .expect("login");

    assert_eq!(session.token(), Some("server-token"));
    assert_eq!(session.officer().map(|o| o.id.as_str()), Some("srv-1"));
}

#[tokio::test]
async fn remote_rejection_falls_through_to_the_roster() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Credenciais inválidas"})),
        )
        .mount(&server)
        .await;

    let (_, roster, mut session) = memory_fixtures().await;
    let resolver = AuthResolver::new(Some(
        RemoteLogin::new(&server.uri(), TIMEOUT).expect("remote"),
    ));
    resolver
        .login(&roster, &mut session, "PN003456", "pn003456")
        .await
        .expect("alternate password");
    assert_eq!(
        session.officer().map(|o| o.badge.as_str()),
        Some("PN003456")
    );
    assert!(
        session
            .token()
            .is_some_and(|token| token.starts_with("pn-session-"))
    );

    resolver.logout(&mut session).await.expect("logout");
    let err = resolver
        .login(&roster, &mut session, "PN003456", "wrong")
        .await
        .expect_err("rejected");
    assert_eq!(err.to_string(), "Matrícula ou palavra-passe incorretos");
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn unreachable_server_uses_local_roster() {
    let (_, roster, mut session) = memory_fixtures().await;
    let resolver = AuthResolver::new(Some(
        RemoteLogin::new("http://127.0.0.1:9", Duration::from_millis(500)).expect("remote"),
    ));
    resolver
        .login(&roster, &mut session, "pn001234", "pn2024")
        .await
        .expect("local login");
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn session_and_registrations_survive_restart() {
    let dir = TempDir::new().expect("dir");
    {
        let storage = file_storage(&dir).await;
        let mut roster = CredentialRoster::load(storage.clone(), 4)
            .await
            .expect("roster");
        roster
            .register(bodigital::roster::Registration {
                name: "Agente Nova Recruta".to_string(),
                rank: "Agente".to_string(),
                badge: "PN123123".to_string(),
                password: "segura".to_string(),
                password_confirmation: "segura".to_string(),
            })
            .await
            .expect("register");

        let mut session = SessionContext::restore(storage).await.expect("session");
        AuthResolver::new(None)
            .login(&roster, &mut session, "PN123123", "segura")
            .await
            .expect("login");
    }

    let storage = file_storage(&dir).await;
    let roster = CredentialRoster::load(storage.clone(), 4)
        .await
        .expect("roster");
    assert_eq!(roster.entries().len(), 6);
    let session = SessionContext::restore(storage).await.expect("session");
    assert!(session.is_authenticated());
    assert_eq!(
        session.officer().map(|o| o.badge.as_str()),
        Some("PN123123")
    );
}

#[tokio::test]
async fn api_client_sends_session_token_and_surfaces_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/boletins"))
        .and(header("authorization", "Bearer session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"boletins": [{"id": "b1"}]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/boletins"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Token de acesso inválido"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/pessoas/1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pessoas"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(&server.uri(), TIMEOUT).expect("client");

    let anonymous = client.get("/boletins").await;
    assert_eq!(anonymous.data, None);
    assert_eq!(anonymous.error.as_deref(), Some("Token de acesso inválido"));

    client.set_token(Some("session-token".to_string()));
    let listed = client.get("/boletins").await;
    assert_eq!(listed.error, None);
    assert_eq!(listed.data, Some(json!({"boletins": [{"id": "b1"}]})));

    let failed = client.delete("/pessoas/1").await;
    assert_eq!(failed.error.as_deref(), Some("Erro 500"));

    let demo = client.get("/pessoas").await;
    assert_eq!(demo.error, None);
    assert_eq!(
        demo.data.as_ref().and_then(|data| data["pessoas"].as_array()).map(Vec::len),
        Some(2)
    );
}

#[tokio::test]
async fn client_stack_talks_to_a_live_server() {
    let state = runtime::build_state(&Config::in_memory(), None)
        .await
        .expect("state");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("serve");
    });
    let base = format!("http://{addr}/make-server-bec4bad8");

    let client = ApiClient::new(&base, TIMEOUT).expect("client");
    let signup = client
        .post(
            "/auth/signup",
            json!({
                "email": "rosa@pn.ao",
                "password": "segredo",
                "nome": "Agente Rosa Cassule",
                "posto": "Agente",
                "matricula": "PN777777"
            }),
        )
        .await;
    assert_eq!(signup.error, None);

    let (_, roster, mut session) = memory_fixtures().await;
    AuthResolver::new(Some(RemoteLogin::new(&base, TIMEOUT).expect("remote")))
        .login(&roster, &mut session, "PN777777", "segredo")
        .await
        .expect("remote login");
    let token = session.token().expect("token").to_string();
    assert!(!token.starts_with("pn-session-"));

    let mut client = client;
    client.set_token(Some(token));
    let created = client
        .post(
            "/boletins",
            json!({
                "numeroBoletim": "BO-2025-500",
                "tipoOcorrencia": "Roubo",
                "local": "Mercado do Kikolo",
                "descricao": "Roubo de telemóvel",
                "dataHoraOcorrencia": "2025-05-01T14:00"
            }),
        )
        .await;
    assert_eq!(created.error, None);

    let stats = client.get("/relatorios/estatisticas").await;
    assert_eq!(
        stats.data.expect("stats")["estatisticas"]["totalBoletins"],
        json!(1)
    );
}
