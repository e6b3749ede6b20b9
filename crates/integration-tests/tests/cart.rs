//! Catalog listing and cart operations.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::json;

use bazaar_integration_tests::TestApp;

#[tokio::test]
async fn test_product_listing_and_search() {
    let app = TestApp::new();
    app.add_product("Coffee Mug", 3, "89.95").await;
    app.add_product("Tea Pot", 0, "249.00").await;

    let all = app.get("/products", None).await;
    assert_eq!(all.status, StatusCode::OK);
    let products = all.body.as_array().unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["name"], "Coffee Mug");
    assert_eq!(products[0]["price"], "89.95");
    assert_eq!(products[0]["currency"], "DKK");
    assert_eq!(products[0]["in_stock"], true);
    assert_eq!(products[1]["in_stock"], false);
    assert!(products[0].get("amount").is_none());

    let found = app.get("/products?search=%20MUG%20", None).await;
    let found = found.body.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], "Coffee Mug");

    let blank = app.get("/products?search=", None).await;
    assert_eq!(blank.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_cart_total() {
    let app = TestApp::new();
    let token = app.register("anna").await;
    let mug = app.add_product("Mug", 10, "10.00").await;
    let plate = app.add_product("Plate", 10, "4.99").await;

    app.add_to_cart(&token, mug, 2).await;
    app.add_to_cart(&token, plate, 1).await;

    let cart = app.get("/carts/final", Some(&token)).await;
    assert_eq!(cart.status, StatusCode::OK);
    assert_eq!(cart.body["total"], "24.99");

    let items = cart.body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["product_name"], "Mug");
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["price_per_item"], "10.00");
    assert_eq!(items[0]["total"], "20.00");
    assert_eq!(items[1]["product_id"], json!(plate));
}

#[tokio::test]
async fn test_every_add_is_a_new_line() {
    let app = TestApp::new();
    let token = app.register("anna").await;
    let mug = app.add_product("Mug", 10, "10.00").await;

    app.add_to_cart(&token, mug, 1).await;
    app.add_to_cart(&token, mug, 1).await;

    let cart = app.get("/carts/final", Some(&token)).await;
    assert_eq!(cart.body["items"].as_array().unwrap().len(), 2);
    assert_eq!(cart.body["total"], "20.00");
}

#[tokio::test]
async fn test_add_to_cart_validation() {
    let app = TestApp::new();
    let token = app.register("anna").await;
    let mug = app.add_product("Mug", 10, "10.00").await;

    let missing = app
        .post("/cart", Some(&token), json!({"product_id": mug}))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.message(), "Missing required fields");

    let zero = app
        .post("/cart", Some(&token), json!({"product_id": mug, "quantity": 0}))
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let unknown = app
        .post("/cart", Some(&token), json!({"product_id": 999, "quantity": 1}))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.message(), "Product not found");
}

#[tokio::test]
async fn test_remove_cart_item() {
    let app = TestApp::new();
    let anna = app.register("anna").await;
    let bob = app.register("bob").await;
    let mug = app.add_product("Mug", 10, "10.00").await;
    app.add_to_cart(&anna, mug, 1).await;

    let cart = app.get("/carts/final", Some(&anna)).await;
    assert_eq!(cart.status, StatusCode::OK);

    // Item ids are not exposed in the summary; the first line has id 1.
    let stolen = app
        .request(Method::DELETE, "/cart/1", Some(&bob), None)
        .await;
    assert_eq!(stolen.status, StatusCode::NOT_FOUND);
    assert_eq!(stolen.message(), "Product not found");

    let removed = app
        .request(Method::DELETE, "/cart/1", Some(&anna), None)
        .await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.message(), "Product removed successfully");

    let again = app
        .request(Method::DELETE, "/cart/1", Some(&anna), None)
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    let empty = app.get("/carts/final", Some(&anna)).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.message(), "Cart is empty");
}

#[tokio::test]
async fn test_carts_are_per_user() {
    let app = TestApp::new();
    let anna = app.register("anna").await;
    let bob = app.register("bob").await;
    let mug = app.add_product("Mug", 10, "10.00").await;
    app.add_to_cart(&anna, mug, 3).await;

    let bobs = app.get("/carts/final", Some(&bob)).await;
    assert_eq!(bobs.status, StatusCode::BAD_REQUEST);
}
