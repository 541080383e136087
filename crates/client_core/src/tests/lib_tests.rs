use super::*;
use crate::test_support::{partner, test_settings, FakePartnerApi};

async fn dashboard(api: &Arc<FakePartnerApi>) -> Arc<Dashboard> {
    Dashboard::new_with_dependencies(
        test_settings(),
        api.clone(),
        Box::new(MemoryStatePersistence::default()),
    )
    .await
}

#[tokio::test]
async fn opening_views_loads_their_data_once() {
    let api = FakePartnerApi::with_partners(vec![
        partner("123", "Beta Lending"),
        partner("124", "Acme Corporation"),
    ]);
    let dashboard = dashboard(&api).await;
    assert_eq!(dashboard.app_state().active_view().await, DashboardView::PartnerList);

    dashboard.open_view(DashboardView::PartnerList).await.expect("list");
    dashboard.open_view(DashboardView::PartnerList).await.expect("list again");
    assert_eq!(dashboard.partners().items().await.len(), 2);

    dashboard.open_view(DashboardView::LoaderUpload).await.expect("upload");
    assert_eq!(dashboard.uploads().picker().snapshot().await.options.len(), 2);
    assert_eq!(dashboard.app_state().active_view().await, DashboardView::LoaderUpload);

    // One listing call for the table, one for the picker.
    assert_eq!(api.list_calls().len(), 2);
}

#[tokio::test]
async fn controllers_share_one_event_stream() {
    let api = FakePartnerApi::with_partners(vec![partner("124", "Acme Corporation")]);
    let dashboard = dashboard(&api).await;
    let mut events = dashboard.subscribe_events();

    dashboard.partners().refresh().await.expect("load");
    dashboard
        .editor()
        .open_by_id(&shared::domain::PartnerId::new("124"))
        .await
        .expect("open");
    dashboard
        .editor()
        .set_field(PartnerField::PartnerName, "Acme Holdings")
        .await
        .expect("edit");
    dashboard.editor().submit().await.expect("save");

    let mut saw_loaded = false;
    let mut saw_saved = false;
    while let Ok(event) = events.try_recv() {
        match event {
            DashboardEvent::PartnersLoaded { .. } => saw_loaded = true,
            DashboardEvent::PartnerSaved(p) => saw_saved = p.partner_name == "Acme Holdings",
            _ => {}
        }
    }
    assert!(saw_loaded && saw_saved);
    assert_eq!(
        dashboard.partners().items().await[0].partner_name,
        "Acme Holdings"
    );
}

#[tokio::test]
async fn connect_uses_configured_backend() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = ClientSettings {
        base_url: "http://127.0.0.1:9".into(),
        state_file: dir.path().join("state.json"),
        ..ClientSettings::default()
    };
    let dashboard = Dashboard::connect(settings).await.expect("connect");
    assert_eq!(dashboard.settings().base_url, "http://127.0.0.1:9");
    assert_eq!(dashboard.app_state().active_view().await, DashboardView::PartnerList);
}
