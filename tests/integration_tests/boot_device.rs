// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::setup::test_setup;
use super::setup::TestContext;
use super::setup::ACTIVE_ID;
use cloud_vbmc::boot::BootDevice;
use cloud_vbmc::boot::BOOT_FLAG_KEY;
use cloud_vbmc::http_entrypoints::BootDeviceSelection;
use reqwest::StatusCode;

async fn boot_device(testctx: &TestContext) -> BootDevice {
    let resp = testctx.get("/boot-device").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json::<BootDeviceSelection>().await.unwrap().device
}

#[tokio::test]
async fn boot_device_round_trip() {
    let testctx = test_setup(ACTIVE_ID, false).await;

    // The instance starts out flagged for network boot.
    assert_eq!(boot_device(&testctx).await, BootDevice::Network);

    let resp = testctx
        .put("/boot-device")
        .json(&BootDeviceSelection { device: BootDevice::Hd })
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(boot_device(&testctx).await, BootDevice::Hd);

    let record = testctx.sim.server(ACTIVE_ID).unwrap();
    let flag = record.metadata.get(BOOT_FLAG_KEY).map(String::as_str);
    assert_eq!(flag, Some(""));

    testctx.teardown().await;
}

#[tokio::test]
async fn unknown_boot_device_rejected() {
    let testctx = test_setup(ACTIVE_ID, false).await;

    let resp = testctx
        .put("/boot-device")
        .json(&serde_json::json!({ "device": "floppy" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(boot_device(&testctx).await, BootDevice::Network);

    testctx.teardown().await;
}
