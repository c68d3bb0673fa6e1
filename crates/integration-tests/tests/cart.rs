//! Cart endpoints: session-held cart, order summary and background sync.

use neoshop_core::Money;
use neoshop_integration_tests::{TestContext, json_body, money};
use serde_json::json;

#[tokio::test]
async fn test_add_item_prices_cart_and_syncs_as_guest() {
    let ctx = TestContext::new().await;

    let resp = ctx.add_item("hoodie", "40.00", 2).await;
    assert_eq!(resp.status(), 200);
    let cart = json_body(resp).await;

    assert_eq!(cart["itemCount"], 2);
    assert_eq!(cart["lines"][0]["variantLabel"], "black / M");
    assert_eq!(money(&cart["totals"]["subtotal"]), Money::from_cents(8000));
    assert_eq!(money(&cart["totals"]["shipping"]), Money::from_cents(599));
    assert_eq!(money(&cart["totals"]["tax"]), Money::from_cents(640));
    assert_eq!(money(&cart["totals"]["total"]), Money::from_cents(9239));

    let call = ctx.backend.wait_for_call("PUT", "cart").await;
    assert_eq!(call.token, None);
    assert_eq!(call.body["productId"], "hoodie");
    assert_eq!(call.body["quantity"], 2);
}

#[tokio::test]
async fn test_cart_survives_between_requests() {
    let ctx = TestContext::new().await;
    ctx.add_item("hoodie", "40.00", 1).await;
    ctx.add_item("hoodie", "40.00", 1).await;

    let cart = json_body(ctx.get("/cart").await).await;
    assert_eq!(cart["lines"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["itemCount"], 2);

    let express = json_body(ctx.get("/cart?shipping=express").await).await;
    assert_eq!(express["shippingMethod"], "express");
    assert_eq!(money(&express["totals"]["shipping"]), Money::from_cents(1299));
}

#[tokio::test]
async fn test_signed_in_sync_carries_token() {
    let ctx = TestContext::new().await;
    assert_eq!(ctx.login("sam@example.com").await.status(), 200);

    ctx.add_item("cap", "15.00", 1).await;

    let call = ctx.backend.wait_for_call("PUT", "cart").await;
    assert_eq!(call.token.as_deref(), Some("tok_sam"));
}

#[tokio::test]
async fn test_quantity_rules() {
    let ctx = TestContext::new().await;
    ctx.add_item("hoodie", "40.00", 2).await;
    let key = json!({ "productId": "hoodie", "color": "black", "size": "M" });

    let mut body = key.clone();
    body["quantity"] = json!(0);
    let resp = ctx.post("/cart/items/quantity", &body).await;
    assert_eq!(resp.status(), 400);

    body["quantity"] = json!(5);
    let cart = json_body(ctx.post("/cart/items/quantity", &body).await).await;
    assert_eq!(cart["itemCount"], 5);

    let unknown = json!({ "productId": "nope", "quantity": 1 });
    let resp = ctx.post("/cart/items/quantity", &unknown).await;
    assert_eq!(resp.status(), 404);
    assert!(json_body(resp).await["error"].is_string());

    let mut adjust = key.clone();
    adjust["delta"] = json!(-5);
    let cart = json_body(ctx.post("/cart/items/adjust", &adjust).await).await;
    assert_eq!(cart["itemCount"], 0);

    let call = ctx.backend.wait_for_call("DELETE", "cart").await;
    assert_eq!(call.body["productId"], "hoodie");
}

#[tokio::test]
async fn test_coupon_errors_are_inline() {
    let ctx = TestContext::new().await;
    ctx.add_item("jacket", "150.00", 1).await;

    let cart = json_body(ctx.post("/cart/coupon", &json!({ "code": "NEOSHOP20" })).await).await;
    assert_eq!(cart["coupon"]["code"], "NEOSHOP20");
    assert_eq!(money(&cart["totals"]["discount"]), Money::from_cents(3000));

    let resp = ctx.post("/cart/coupon", &json!({ "code": "BOGUS" })).await;
    assert_eq!(resp.status(), 200);
    let cart = json_body(resp).await;
    assert!(cart["couponError"].as_str().is_some_and(|m| m.contains("BOGUS")));
    assert!(cart["coupon"].is_null());
    assert_eq!(money(&cart["totals"]["discount"]), Money::ZERO);
}

#[tokio::test]
async fn test_remove_coupon() {
    let ctx = TestContext::new().await;
    ctx.add_item("jacket", "150.00", 1).await;
    ctx.post("/cart/coupon", &json!({ "code": "NEOSHOP20" })).await;

    let resp = ctx
        .send(reqwest::Method::DELETE, "/cart/coupon", &json!({}))
        .await;
    let cart = json_body(resp).await;
    assert!(cart["coupon"].is_null());
}

#[tokio::test]
async fn test_oversized_price_is_rejected() {
    let ctx = TestContext::new().await;
    ctx.add_item("tee", "20.00", 1).await;

    let resp = ctx.add_item("yacht", "79228162514264337593543950335", 2).await;
    assert_eq!(resp.status(), 400);
    assert!(json_body(resp).await["error"].is_string());

    // The cart is unchanged and still renders.
    let resp = ctx.get("/cart").await;
    assert_eq!(resp.status(), 200);
    let cart = json_body(resp).await;
    assert_eq!(cart["itemCount"], 1);
    assert_eq!(money(&cart["totals"]["subtotal"]), Money::from_cents(2000));
}
