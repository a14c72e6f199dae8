// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::setup::test_setup;
use super::setup::TestContext;
use super::setup::SHUTOFF_ID;
use super::setup::SHUTOFF_NAME;
use cloud_vbmc::error::ComputeError;
use cloud_vbmc::http_entrypoints::PowerState;
use cloud_vbmc::sim::SimOp;
use reqwest::StatusCode;

async fn powered_on(testctx: &TestContext) -> bool {
    let resp = testctx.get("/power").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json::<PowerState>().await.unwrap().powered_on
}

async fn request_power(testctx: &TestContext, path: &str) -> StatusCode {
    testctx.post(path).send().await.unwrap().status()
}

#[tokio::test]
async fn power_cycle() {
    let testctx = test_setup(SHUTOFF_NAME, false).await;
    assert_eq!(testctx.instance.id, SHUTOFF_ID);
    let sim = &testctx.sim;

    assert!(!powered_on(&testctx).await);

    assert_eq!(
        request_power(&testctx, "/power/on").await,
        StatusCode::NO_CONTENT
    );
    assert!(powered_on(&testctx).await);
    // Already on: no second start request goes out.
    assert_eq!(
        request_power(&testctx, "/power/on").await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(sim.call_count(SimOp::Start), 1);

    assert_eq!(
        request_power(&testctx, "/power/off").await,
        StatusCode::NO_CONTENT
    );
    assert!(!powered_on(&testctx).await);
    assert_eq!(
        request_power(&testctx, "/power/off").await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(sim.call_count(SimOp::Stop), 1);

    testctx.teardown().await;
}

#[tokio::test]
async fn cached_status_skips_compute_once_landed() {
    let testctx = test_setup(SHUTOFF_ID, true).await;
    let sim = &testctx.sim;

    assert_eq!(
        request_power(&testctx, "/power/on").await,
        StatusCode::NO_CONTENT
    );
    // The first status read after the request still has to ask; once the
    // transition is observed the cached state is trusted.
    assert!(powered_on(&testctx).await);
    let polls = sim.call_count(SimOp::GetById);
    assert!(powered_on(&testctx).await);
    assert!(powered_on(&testctx).await);
    assert_eq!(sim.call_count(SimOp::GetById), polls);

    testctx.teardown().await;
}

#[tokio::test]
async fn conflict_is_not_a_fault() {
    let testctx = test_setup(SHUTOFF_ID, false).await;
    testctx.sim.inject_fault(
        SimOp::Start,
        ComputeError::Conflict("task_state is powering-on".to_string()),
    );

    assert_eq!(
        request_power(&testctx, "/power/on").await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(testctx.sim.call_count(SimOp::Start), 1);

    testctx.teardown().await;
}

#[tokio::test]
async fn compute_failures_map_to_http_errors() {
    let testctx = test_setup(SHUTOFF_ID, false).await;
    let sim = &testctx.sim;

    sim.inject_fault(
        SimOp::GetById,
        ComputeError::NotFound(format!("no server with id {SHUTOFF_ID}")),
    );
    let resp = testctx.get("/power").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    sim.inject_fault(
        SimOp::GetById,
        ComputeError::Transient("connection refused".to_string()),
    );
    assert_eq!(
        request_power(&testctx, "/power/on").await,
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(sim.call_count(SimOp::Start), 0);

    sim.inject_fault(
        SimOp::GetById,
        ComputeError::Other("HTTP 400 Bad Request".to_string()),
    );
    assert_eq!(
        request_power(&testctx, "/power/off").await,
        StatusCode::INTERNAL_SERVER_ERROR
    );

    // Nothing is retried behind the client's back, and the instance is
    // still usable afterwards.
    assert!(!powered_on(&testctx).await);

    testctx.teardown().await;
}
