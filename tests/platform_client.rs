use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use courtrush::gateway::{BookingGateway, GatewayError, PlatformClient, PlatformSettings};
use courtrush::model::{AvailabilityQuery, Candidate, Identity, LockFlag};

// ── Test infrastructure ──────────────────────────────────────

const PREFIX: &str = "/xinshan/opensc";

fn client_for(server: &MockServer) -> PlatformClient {
    client_with_timeout(server, Duration::from_secs(5))
}

fn client_with_timeout(server: &MockServer, request_timeout: Duration) -> PlatformClient {
    PlatformClient::new(PlatformSettings {
        base_url: format!("{}{PREFIX}", server.uri()),
        api_version: "1.4.121".into(),
        order_page_url: "http://kfxy.example/#/pages/space/orderBatch".into(),
        request_timeout,
    })
    .unwrap()
}

fn query() -> AvailabilityQuery {
    AvailabilityQuery {
        space_id: "111162".into(),
        sport_type: "2".into(),
        date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
    }
}

fn identity() -> Identity {
    Identity::new("tok-1", "4242", "138****0000").unwrap()
}

// ── Availability ─────────────────────────────────────────────

#[tokio::test]
async fn availability_query_sends_params_and_parses_slices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/open/getSpaceOrderDetailsNew")))
        .and(query_param("spaceId", "111162"))
        .and(query_param("sportType", "2"))
        .and(query_param("time", "2026-10-16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "actionState": 1,
            "data": {"openSlice": {
                "s1": {"slice_name": "1号场", "slice_time": "16:30--18:30", "is_lock": 0},
                "s2": {"slice_name": "2号场", "slice_time": "16:30--18:30", "is_lock": "1"},
            }}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = client_for(&server).query_availability(&query()).await.unwrap();

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.entries[0].instance_id, "s1");
    assert_eq!(snapshot.entries[0].display_name, "1号场");
    assert!(snapshot.entries[0].lock.is_unlocked());
    assert_eq!(snapshot.entries[1].lock, LockFlag(Some(1)));
}

#[tokio::test]
async fn availability_without_slices_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/open/getSpaceOrderDetailsNew")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"actionState": 0, "msg": "closed"})))
        .mount(&server)
        .await;

    let snapshot = client_for(&server).query_availability(&query()).await.unwrap();
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/open/getSpaceOrderDetailsNew")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).query_availability(&query()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(_)), "got {err:?}");
}

#[tokio::test]
async fn server_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client_for(&server).query_availability(&query()).await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::Status {
            status: 503,
            body: "busy".into()
        }
    );
}

#[tokio::test]
async fn slow_platform_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {}}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = client_with_timeout(&server, Duration::from_millis(50));
    let err = client.query_availability(&query()).await.unwrap_err();
    assert_eq!(err, GatewayError::Timeout);
}

// ── Claims ───────────────────────────────────────────────────

#[tokio::test]
async fn claim_posts_order_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/order/createOrderBatch")))
        .and(header("Token", "tok-1"))
        .and(body_partial_json(json!({
            "apiVersion": "1.4.121",
            "orderType": 1,
            "userId": 4242,
            "orderUser": 1,
            "soOpenid": "s1",
            "phones": ["138****0000"],
            "fullPath": "http://kfxy.example/#/pages/space/orderBatch?openid=s1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "actionState": 1,
            "data": {"codeUrl": "weixin://wxpay/bizpayurl?pr=abc", "orderNo": "X1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let candidate = Candidate {
        instance_id: "s1".into(),
        display_name: "1号场".into(),
    };
    let response = client_for(&server).submit_claim(&candidate, &identity()).await.unwrap();

    assert_eq!(response.status, Some(1));
    assert_eq!(response.payment_handle.as_deref(), Some("weixin://wxpay/bizpayurl?pr=abc"));
    assert_eq!(response.data["orderNo"], "X1");
}

#[tokio::test]
async fn claim_rejection_keeps_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/order/createOrderBatch")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "actionState": 0,
            "msg": "该场地已被预订",
            "data": {"codeUrl": ""}
        })))
        .mount(&server)
        .await;

    let candidate = Candidate {
        instance_id: "s1".into(),
        display_name: "1号场".into(),
    };
    let response = client_for(&server).submit_claim(&candidate, &identity()).await.unwrap();

    assert_eq!(response.status, Some(0));
    assert_eq!(response.payment_handle, None);
    assert_eq!(response.message.as_deref(), Some("该场地已被预订"));
}

// ── Session ──────────────────────────────────────────────────

#[tokio::test]
async fn sms_login_and_verified_phone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/user/loginSms")))
        .and(body_string_contains("phone=13800000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"actionState": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/user/SOLoginPhone")))
        .and(body_string_contains("smsCode=123456"))
        .and(body_string_contains("openId=oid-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "actionState": 0,
            "data": {"token": "tok-9", "userId": 4242}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/user/verifiedInfo")))
        .and(header("Token", "tok-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "actionState": 1,
            "data": {"phonestr": "138****0000"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.send_sms_code("13800000000").await.unwrap();
    let session = client.login_with_sms("13800000000", "123456", "oid-9").await.unwrap();
    assert_eq!(session.token, "tok-9");
    assert_eq!(session.user_id, "4242");

    let phone = client.verified_phone(&session.token).await.unwrap();
    assert_eq!(phone, "138****0000");
}

#[tokio::test]
async fn wrong_sms_code_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/user/SOLoginPhone")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "actionState": 1,
            "msg": "验证码错误"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .login_with_sms("13800000000", "000000", "")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        GatewayError::Refused {
            state: Some(1),
            message: "验证码错误".into()
        }
    );
}

#[tokio::test]
async fn unverified_account_has_no_phone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/user/verifiedInfo")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "actionState": 1,
            "data": {"phonestr": ""}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).verified_phone("tok-1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Refused { state: Some(1), .. }));
}
