//! Server builder and service against the in-memory provider

mod common;

use common::{FakeCloud, SHARED_SEGMENT_ID, ZONE, fast_config};
use pretty_assertions::assert_eq;
use sacloud_iaas::{Id, PREVIOUS_ID_TAG_PREFIX, Scope};
use sacloud_iaas_service::server::{self, NetworkInterface};
use sacloud_iaas_service::disk::{DiskBuilder, DiskClient};
use sacloud_iaas_service::{ServiceError, disk};

fn data_disk(name: &str) -> disk::ApplyRequest {
    disk::ApplyRequest {
        name: name.into(),
        size_gb: 20,
        ..Default::default()
    }
}

fn web_server(cloud: &FakeCloud) -> server::CreateRequest {
    let switch_id = cloud.add_switch(2001);
    let packet_filter_id = cloud.add_packet_filter(3001);
    server::CreateRequest {
        name: "web".into(),
        cpu: 2,
        memory_gb: 4,
        boot_after_create: true,
        network_interfaces: vec![
            NetworkInterface {
                upstream: "shared".into(),
                packet_filter_id,
                ..Default::default()
            },
            NetworkInterface {
                upstream: switch_id.to_string(),
                user_ip_address: "192.168.0.11".into(),
                ..Default::default()
            },
        ],
        disks: vec![data_disk("web-disk")],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_builds_disks_nics_and_boots() {
    let cloud = FakeCloud::new();
    let service = server::Service::with_config(cloud.caller(), fast_config());

    let created = service.create(&web_server(&cloud)).await.unwrap();

    assert!(created.instance_status.is_up());
    assert_eq!(created.cpu, 2);
    assert_eq!(created.memory_gb(), 4);
    assert_eq!(created.disks.len(), 1);
    assert_eq!(created.interfaces.len(), 2);
    assert_eq!(created.interfaces[0].switch_id, SHARED_SEGMENT_ID);
    assert_eq!(created.interfaces[0].switch_scope, Scope::Shared);
    assert_eq!(created.interfaces[0].packet_filter_id, Id(3001));
    assert_eq!(created.interfaces[1].switch_id, Id(2001));
    assert_eq!(created.interfaces[1].user_ip_address, "192.168.0.11");
    assert_eq!(
        cloud.mutating_calls(),
        vec![
            "server.create",
            "disk.create",
            "interface.connect_to_packet_filter",
            "interface.update",
            "server.boot",
        ]
    );
}

#[tokio::test]
async fn test_failed_disk_reports_what_was_built() {
    let cloud = FakeCloud::new();
    cloud.fail_call("disk.create", 2);

    let req = server::ApplyRequest {
        name: "db".into(),
        cpu: 1,
        memory_gb: 1,
        disks: vec![data_disk("db-1"), data_disk("db-2")],
        ..Default::default()
    };
    let mut builder = req.builder(&cloud).unwrap();
    builder.set_waiter(fast_config().setup.waiter());

    let failure = builder.build(ZONE).await.unwrap_err();
    assert!(!failure.partial.server_id.is_empty());
    assert_eq!(failure.partial.disk_ids.len(), 1);
    assert!(matches!(failure.error, ServiceError::Api(_)));

    let server = cloud.stored_server(failure.partial.server_id).unwrap();
    assert_eq!(server.disks.len(), 1);
    assert_eq!(server.disks[0].id, failure.partial.disk_ids[0]);
    assert!(server.instance_status.is_down());
}

#[tokio::test]
async fn test_service_reconcile_returns_partial_result() {
    let cloud = FakeCloud::new();
    cloud.fail_call("disk.create", 2);
    cloud.fail_call("disk.create", 4);
    let service = server::Service::with_config(cloud.caller(), fast_config());
    let req = server::ApplyRequest {
        name: "db".into(),
        disks: vec![data_disk("db-1"), data_disk("db-2")],
        ..Default::default()
    };

    let failure = service.reconcile(&req).await.unwrap_err();

    assert_eq!(cloud.stored_servers().len(), 1);
    assert_eq!(failure.partial.server_id, cloud.stored_servers()[0].id);
    assert_eq!(failure.partial.disk_ids.len(), 1);

    let err = service.apply(&req).await.unwrap_err();
    assert!(matches!(err, ServiceError::Api(_)));
}

#[tokio::test]
async fn test_update_without_changes_makes_no_mutating_calls() {
    let cloud = FakeCloud::new();
    let service = server::Service::with_config(cloud.caller(), fast_config());
    let created = service.create(&web_server(&cloud)).await.unwrap();
    cloud.clear_calls();

    let updated = service
        .update(&server::UpdateRequest {
            id: created.id,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(updated, created);
    assert_eq!(cloud.mutating_calls(), Vec::<String>::new());
}

#[tokio::test]
async fn test_builder_from_resource_reproduces_desired_state() {
    let cloud = FakeCloud::new();
    let req = web_server(&cloud).apply_request();
    let mut desired = req.builder(&cloud).unwrap();
    desired.set_waiter(fast_config().setup.waiter());
    let built = desired.build(ZONE).await.unwrap();
    let created = cloud.stored_server(built.server_id).unwrap();

    let builder = server::ServerBuilder::from_resource(&cloud, ZONE, created.id)
        .await
        .unwrap();

    assert_eq!(builder.server_id, created.id);
    assert_eq!(builder.name, desired.name);
    assert_eq!(builder.cpu, desired.cpu);
    assert_eq!(builder.memory_gb, desired.memory_gb);
    assert_eq!(builder.nic, desired.nic);
    assert_eq!(builder.additional_nics, desired.additional_nics);

    let disk_ids: Vec<Id> = builder.disk_builders.iter().map(|d| d.disk_id()).collect();
    assert_eq!(disk_ids, built.disk_ids);
    match &builder.disk_builders[0] {
        DiskBuilder::Connected(disk) => {
            assert_eq!(disk.name, req.disks[0].name);
            assert_eq!(disk.description, req.disks[0].description);
            assert_eq!(disk.tags, req.disks[0].tags);
            assert_eq!(disk.connection, req.disks[0].connection);
        }
        other => panic!("unexpected disk builder: {:?}", other),
    }

    assert!(!builder.is_need_shutdown(ZONE).await.unwrap());
    assert!(!builder.is_plan_changed(&created));
}

#[tokio::test]
async fn test_failed_disk_on_update_keeps_connected_disks() {
    let cloud = FakeCloud::new();
    let req = server::ApplyRequest {
        name: "db".into(),
        cpu: 1,
        memory_gb: 1,
        disks: vec![data_disk("db-1")],
        ..Default::default()
    };
    let mut builder = req.builder(&cloud).unwrap();
    builder.set_waiter(fast_config().setup.waiter());
    let built = builder.build(ZONE).await.unwrap();
    cloud.fail_call("disk.create", 2);

    let mut builder = server::ServerBuilder::from_resource(&cloud, ZONE, built.server_id)
        .await
        .unwrap();
    builder.disk_builders.push(data_disk("db-2").builder(DiskClient::new(&cloud)));
    builder.set_waiter(fast_config().setup.waiter());

    let failure = builder.update(ZONE).await.unwrap_err();

    assert!(matches!(failure.error, ServiceError::Api(_)));
    assert_eq!(failure.partial.server_id, built.server_id);
    assert_eq!(failure.partial.disk_ids, built.disk_ids);
    let server = cloud.stored_server(built.server_id).unwrap();
    assert_eq!(server.disks.len(), 1);
}

#[tokio::test]
async fn test_plan_change_restarts_and_tags_previous_id() {
    let cloud = FakeCloud::new();
    let service = server::Service::with_config(cloud.caller(), fast_config());
    let created = service.create(&web_server(&cloud)).await.unwrap();
    cloud.clear_calls();

    let updated = service
        .update(&server::UpdateRequest {
            id: created.id,
            cpu: Some(4),
            memory_gb: Some(8),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_ne!(updated.id, created.id);
    assert_eq!(updated.cpu, 4);
    assert!(updated.instance_status.is_up());
    assert!(
        updated
            .tags
            .contains(&format!("{}{}", PREVIOUS_ID_TAG_PREFIX, created.id))
    );
    assert_eq!(updated.disks.len(), 1);
    assert_eq!(
        cloud.mutating_calls(),
        vec![
            "server.shutdown",
            "server.change_plan",
            "server.update",
            "server.boot"
        ]
    );
}

#[tokio::test]
async fn test_delete_running_server_is_rejected() {
    let cloud = FakeCloud::new();
    let service = server::Service::with_config(cloud.caller(), fast_config());
    let created = service.create(&web_server(&cloud)).await.unwrap();

    let err = service
        .delete(&server::DeleteRequest {
            id: created.id,
            with_disks: true,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert!(cloud.stored_server(created.id).is_some());
}
