use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use rstest::{fixture, rstest};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use super::create_routes;
use crate::config::Config;
use crate::models::{
    Event, EventInput, EventStatus, NewRegistration, NewUser, Registration, RegistrationStatus,
    User,
};
use crate::repository::MemoryStore;
use crate::services::auth::{hash_password, session_expiry, SESSION_COOKIE};
use crate::state::AppState;
use crate::utils::flash::{Flash, FlashKind};

struct TestApp {
    router: Router,
    state: AppState,
}

fn app_with(config: Config) -> TestApp {
    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    TestApp {
        router: create_routes(state.clone()),
        state,
    }
}

#[fixture]
fn app() -> TestApp {
    app_with(Config::default())
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn user(&self, email: &str) -> (User, String) {
        let user = self
            .state
            .store
            .create_user(&NewUser {
                email: email.to_string(),
                password_hash: hash_password("secret123").unwrap(),
                first_name: "Test".into(),
                last_name: email.split('@').next().unwrap().to_string(),
            })
            .await
            .unwrap();
        let token = self
            .state
            .store
            .create_session(user.id, session_expiry(Utc::now()))
            .await
            .unwrap();
        (user, format!("{SESSION_COOKIE}={token}"))
    }

    async fn event(&self, organizer: Uuid, title: &str, capacity: Option<i32>) -> Event {
        let starts_at = Utc::now() + Duration::days(10);
        self.state
            .store
            .create_event(
                organizer,
                &EventInput {
                    title: title.to_string(),
                    description: "Details".into(),
                    location: "Berlin".into(),
                    starts_at,
                    ends_at: None,
                    capacity,
                    status: EventStatus::Published,
                    category: None,
                    private: false,
                    registration_open_from: None,
                    registration_open_until: None,
                    rundown: Vec::new(),
                },
            )
            .await
            .unwrap()
    }

    async fn register(&self, event_id: Uuid, email: &str) -> Registration {
        self.state
            .store
            .register(event_id, &NewRegistration::parse(email, None, None).unwrap())
            .await
            .unwrap()
    }
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

fn flash(response: &Response) -> Option<Flash> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find_map(Flash::from_cookie_header)
}

#[rstest]
#[tokio::test]
async fn test_health_check(app: TestApp) {
    let response = app.send(get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "ok");
}

#[rstest]
#[tokio::test]
async fn test_listing_ranks_exact_then_prefix_then_substring(app: TestApp) {
    let organizer = Uuid::new_v4();
    app.event(organizer, "Learning Jazz", None).await;
    app.event(organizer, "Jazz Night", None).await;
    app.event(organizer, "Jazz", None).await;
    app.event(organizer, "Poetry Slam", None).await;

    let response = app.send(get("/events?title=jazz", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;

    let exact = html.find(">Jazz</a>").unwrap();
    let prefix = html.find(">Jazz Night</a>").unwrap();
    let substring = html.find(">Learning Jazz</a>").unwrap();
    assert!(exact < prefix && prefix < substring);
    assert!(!html.contains("Poetry Slam"));
}

#[rstest]
#[tokio::test]
async fn test_registration_refused_when_full(app: TestApp) {
    let event = app.event(Uuid::new_v4(), "Tiny Workshop", Some(1)).await;
    app.register(event.id, "first@example.com").await;

    let response = app
        .send(post_form(
            &format!("/events/{}/registrations", event.id),
            "email=second%40example.com&name=Second",
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/events/{}", event.id));
    let flash = flash(&response).unwrap();
    assert_eq!(flash.kind, FlashKind::Alert);
    assert!(flash.message.contains("This event is full."));

    let registrations = app
        .state
        .store
        .registrations_for_event(event.id)
        .await
        .unwrap();
    assert_eq!(registrations.len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_registration_normalizes_email_and_links_user(app: TestApp) {
    let event = app.event(Uuid::new_v4(), "Meetup", None).await;
    let (user, cookie) = app.user("guest@example.com").await;

    let response = app
        .send(post_form(
            &format!("/events/{}/registrations", event.id),
            "email=Guest%40Example.com",
            Some(&cookie),
        ))
        .await;
    assert_eq!(flash(&response).unwrap().kind, FlashKind::Notice);

    let registration = app
        .state
        .store
        .registration_by_email(event.id, "guest@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.user_id, Some(user.id));
}

fn registration_from(uri: &str, i: usize, peer: [u8; 4], forwarded_for: &str) -> Request<Body> {
    let mut request = post_form(uri, &format!("email=guest{i}%40example.com"), None);
    request
        .headers_mut()
        .insert("x-forwarded-for", forwarded_for.parse().unwrap());
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
    request
}

#[rstest]
#[tokio::test]
async fn test_sixth_registration_from_one_peer_is_throttled(app: TestApp) {
    let event = app.event(Uuid::new_v4(), "Popular", None).await;
    let uri = format!("/events/{}/registrations", event.id);
    let peer = [198, 51, 100, 4];

    for i in 0..5 {
        let request = registration_from(&uri, i, peer, &format!("10.9.9.{i}"));
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    let response = app
        .send(registration_from(&uri, 5, peer, "10.9.9.5"))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let body = body_json(response).await;
    assert_eq!(
        body["error"],
        "Too many registration requests. Please try again later."
    );

    let other_peer = app
        .send(registration_from(&uri, 6, [198, 51, 100, 5], "10.9.9.5"))
        .await;
    assert_eq!(other_peer.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_trusted_proxy_throttles_by_forwarded_client() {
    let app = app_with(Config {
        trust_proxy: true,
        ..Config::default()
    });
    let event = app.event(Uuid::new_v4(), "Proxied", None).await;
    let uri = format!("/events/{}/registrations", event.id);
    let proxy = [10, 0, 0, 2];

    for i in 0..6 {
        let forwarded = format!("203.0.113.{i}");
        let response = app.send(registration_from(&uri, i, proxy, &forwarded)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    for i in 6..11 {
        let response = app
            .send(registration_from(&uri, i, proxy, "1.2.3.4, 203.0.113.200"))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
    let response = app
        .send(registration_from(&uri, 11, proxy, "5.6.7.8, 203.0.113.200"))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[rstest]
#[tokio::test]
async fn test_lowering_capacity_evicts_newest_registrations(app: TestApp) {
    let (organizer, cookie) = app.user("organizer@example.com").await;
    let event = app.event(organizer.id, "Shrinking Talk", Some(4)).await;
    let mut registrations = Vec::new();
    for i in 0..4 {
        registrations.push(app.register(event.id, &format!("guest{i}@example.com")).await);
    }

    let starts_at = (Utc::now() + Duration::days(10)).format("%Y-%m-%dT%H:%M");
    let body = format!(
        "title=Shrinking+Talk&description=Details&location=Berlin&starts_at={starts_at}&capacity=2&status=published"
    );
    let response = app
        .send(post_form(&format!("/events/{}", event.id), &body, Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(flash(&response)
        .unwrap()
        .message
        .contains("2 registrations were removed"));

    let remaining: Vec<Uuid> = app
        .state
        .store
        .registrations_for_event(event.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(remaining, vec![registrations[0].id, registrations[1].id]);
}

#[rstest]
#[tokio::test]
async fn test_invalid_event_form_rerenders_with_422(app: TestApp) {
    let (_user, cookie) = app.user("maker@example.com").await;
    let response = app
        .send(post_form(
            "/events",
            "title=&description=x&location=y&starts_at=2026-05-01T10%3A00&ends_at=2026-04-01T10%3A00&rundown_heading=Intro&rundown_description=",
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(response).await;
    assert!(html.contains("Title can&#x27;t be blank") || html.contains("Title can't be blank"));
    assert!(html.contains("value=\"Intro\""));
}

#[rstest]
#[tokio::test]
async fn test_only_organizer_can_check_in_and_it_toggles(app: TestApp) {
    let (organizer, organizer_cookie) = app.user("boss@example.com").await;
    let (_other, other_cookie) = app.user("intruder@example.com").await;
    let event = app.event(organizer.id, "Gala", None).await;
    let registration = app.register(event.id, "guest@example.com").await;
    let uri = format!("/registrations/{}/check_in", registration.id);

    let response = app.send(post_form(&uri, "", Some(&other_cookie))).await;
    assert_eq!(location(&response), "/dashboard");
    assert_eq!(flash(&response).unwrap().kind, FlashKind::Alert);

    let response = app.send(post_form(&uri, "", Some(&organizer_cookie))).await;
    assert_eq!(location(&response), format!("/events/{}/check_in", event.id));
    let stored = app
        .state
        .store
        .find_registration(registration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RegistrationStatus::CheckedIn);
    assert!(stored.check_in_at.is_some());

    app.send(post_form(&uri, "", Some(&organizer_cookie))).await;
    let stored = app
        .state
        .store
        .find_registration(registration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RegistrationStatus::Registered);
    assert!(stored.check_in_at.is_none());
}

#[rstest]
#[tokio::test]
async fn test_reviews_require_registration_and_authorship(app: TestApp) {
    let event = app.event(Uuid::new_v4(), "Concert", None).await;
    let (_author, author_cookie) = app.user("fan@example.com").await;
    let (_stranger, stranger_cookie) = app.user("stranger@example.com").await;
    let registration = app.register(event.id, "fan@example.com").await;
    let reviews_uri = format!("/events/{}/reviews", event.id);

    let response = app
        .send(post_form(&reviews_uri, "rating=5", Some(&stranger_cookie)))
        .await;
    assert_eq!(
        flash(&response).unwrap().message,
        "You must join the event before reviewing it."
    );

    let response = app
        .send(post_form(&reviews_uri, "rating=4&comment=Great", Some(&author_cookie)))
        .await;
    assert_eq!(
        location(&response),
        format!("/events/{}#reviews-panel", event.id)
    );
    assert_eq!(flash(&response).unwrap().kind, FlashKind::Notice);

    let response = app
        .send(post_form(&reviews_uri, "rating=3", Some(&author_cookie)))
        .await;
    assert_eq!(
        flash(&response).unwrap().message,
        "You have already reviewed this event."
    );

    let review = app
        .state
        .store
        .review_for_registration(registration.id)
        .await
        .unwrap()
        .unwrap();
    let response = app
        .send(post_form(
            &format!("/events/{}/reviews/{}", event.id, review.id),
            "rating=1",
            Some(&stranger_cookie),
        ))
        .await;
    assert_eq!(
        flash(&response).unwrap().message,
        "You can only edit or delete your own review."
    );
    let unchanged = app
        .state
        .store
        .find_review(event.id, review.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.review.rating, 4);
}

#[rstest]
#[tokio::test]
async fn test_comments_are_author_only(app: TestApp) {
    let event = app.event(Uuid::new_v4(), "Book Club", None).await;
    let (author, author_cookie) = app.user("reader@example.com").await;
    let (_other, other_cookie) = app.user("other@example.com").await;
    let comment = app
        .state
        .store
        .create_comment(event.id, author.id, "See you there")
        .await
        .unwrap();

    let response = app
        .send(post_form(
            &format!("/events/{}/comments/{}/delete", event.id, comment.id),
            "",
            Some(&other_cookie),
        ))
        .await;
    assert_eq!(flash(&response).unwrap().kind, FlashKind::Alert);

    let response = app
        .send(post_form(
            &format!("/events/{}/comments/{}", event.id, comment.id),
            "content=Running+late",
            Some(&author_cookie),
        ))
        .await;
    assert_eq!(
        location(&response),
        format!("/events/{}#comments-panel", event.id)
    );
    let comments = app.state.store.comments_for_event(event.id).await.unwrap();
    assert_eq!(comments[0].comment.content, "Running late");
}

#[rstest]
#[tokio::test]
async fn test_protected_pages_redirect_to_login(app: TestApp) {
    let response = app.send(get("/dashboard", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(flash(&response).unwrap().kind, FlashKind::Alert);
}

#[rstest]
#[tokio::test]
async fn test_drafts_are_hidden_from_other_users(app: TestApp) {
    let (organizer, cookie) = app.user("drafter@example.com").await;
    let event = app.event(organizer.id, "Secret Plans", None).await;
    let mut input = EventInput {
        title: event.title.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        starts_at: event.starts_at,
        ends_at: None,
        capacity: None,
        status: EventStatus::Draft,
        category: None,
        private: false,
        registration_open_from: None,
        registration_open_until: None,
        rundown: Vec::new(),
    };
    app.state.store.update_event(event.id, &input).await.unwrap();

    let uri = format!("/events/{}", event.id);
    assert_eq!(app.send(get(&uri, None)).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.send(get(&uri, Some(&cookie))).await.status(), StatusCode::OK);

    input.status = EventStatus::Published;
    input.private = true;
    app.state.store.update_event(event.id, &input).await.unwrap();
    assert_eq!(app.send(get(&uri, None)).await.status(), StatusCode::OK);
    let listing = body_text(app.send(get("/events", None)).await).await;
    assert!(!listing.contains("Secret Plans"));
}

#[rstest]
#[tokio::test]
async fn test_signup_then_login(app: TestApp) {
    let response = app
        .send(post_form(
            "/signup",
            "email=New%40Example.com&password=hunter22&password_confirmation=hunter22&first_name=New&last_name=User",
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookies: Vec<&str> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with(SESSION_COOKIE)));

    let response = app
        .send(post_form("/login", "email=new%40example.com&password=wrong", None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("Invalid email or password."));

    let response = app
        .send(post_form("/login", "email=NEW%40example.com&password=hunter22", None))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
}

#[rstest]
#[tokio::test]
async fn test_profile_update_validates(app: TestApp) {
    let (user, cookie) = app.user("profile@example.com").await;
    let response = app
        .send(post_form(
            "/account",
            "first_name=&last_name=Doe&email=profile%40example.com",
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .send(post_form(
            "/account",
            "first_name=Jane&last_name=Doe&email=Jane%40Example.com&phone_number=%2B49+30+1234",
            Some(&cookie),
        ))
        .await;
    assert_eq!(location(&response), "/account");
    let updated = app.state.store.find_user(user.id).await.unwrap().unwrap();
    assert_eq!(updated.email, "jane@example.com");
    assert_eq!(updated.phone_number.as_deref(), Some("+49 30 1234"));
}

#[rstest]
#[tokio::test]
async fn test_search_suggestions(app: TestApp) {
    let organizer = Uuid::new_v4();
    app.event(organizer, "Music Jam Session", None).await;
    app.event(organizer, "Jazz Night", None).await;

    let response = app
        .send(get("/events/search_suggestions?q=j&type=title", None))
        .await;
    assert_eq!(body_json(response).await, serde_json::json!([]));

    let response = app
        .send(get("/events/search_suggestions?q=ja&type=title", None))
        .await;
    let body = body_json(response).await;
    assert_eq!(body[0]["value"], "Jazz Night");
    assert_eq!(body[1]["label"], "Music Jam Session");
}

#[rstest]
#[tokio::test]
async fn test_ai_endpoints_use_placeholders_without_key(app: TestApp) {
    let response = app
        .send(post_json(
            "/ai/chat",
            serde_json::json!({ "message": "", "options": ["create_event"] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("I can help you create an event!"));

    let response = app
        .send(post_json(
            "/ai/generate_content",
            serde_json::json!({ "prompt": "", "existing_text": "Tea tasting", "action": "enhance" }),
        ))
        .await;
    let body = body_json(response).await;
    assert!(body["content"]
        .as_str()
        .unwrap()
        .starts_with("Enhanced version: Tea tasting"));

    let response = app
        .send(post_json("/api/ai_images", serde_json::json!({ "prompt": " " })))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"], "Prompt is required");

    let response = app
        .send(post_json("/api/ai_images", serde_json::json!({ "prompt": "poster" })))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[rstest]
#[tokio::test]
async fn test_cancel_frees_the_spot(app: TestApp) {
    let event = app.event(Uuid::new_v4(), "One Seat", Some(1)).await;
    let (_user, cookie) = app.user("seat@example.com").await;
    let registration = app.register(event.id, "seat@example.com").await;

    let response = app
        .send(post_form(
            &format!("/registrations/{}/cancel", registration.id),
            "",
            Some(&cookie),
        ))
        .await;
    assert_eq!(flash(&response).unwrap().kind, FlashKind::Notice);

    let summary = app.state.store.find_event(event.id).await.unwrap().unwrap();
    assert_eq!(summary.active_registrations, 0);
    app.register(event.id, "next@example.com").await;
}
