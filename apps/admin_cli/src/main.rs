use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    load_settings, CandidateFile, ClientError, Dashboard, DashboardView, FileSource,
    FileUploadStatus, LoaderSortKey, OnboardingOutcome, PartnerField, SortDirection,
    SubmitOutcome,
};
use shared::{domain::PartnerId, error::FieldErrors};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "partner-admin", about = "Partner management admin console")]
struct Cli {
    /// Overrides the backend base URL from settings.
    #[arg(long)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists one page of partners.
    List {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long)]
        size: Option<u32>,
        #[arg(long)]
        query: Option<String>,
    },
    /// Edits a partner; only the given fields change.
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        partner_type: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        contact_number: Option<String>,
        #[arg(long)]
        date_of_agreement: Option<String>,
        #[arg(long)]
        pan: Option<String>,
    },
    /// Registers a new partner.
    Onboard {
        #[arg(long)]
        name: String,
        #[arg(long = "type", default_value = "Corporate")]
        partner_type: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        contact_number: String,
        #[arg(long)]
        pan: String,
        #[arg(long)]
        gst: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        date_of_agreement: String,
    },
    /// Shows a partner's loader configurations.
    Configs {
        partner_id: String,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_enum, default_value_t = SortArg::CreatedAt)]
        sort: SortArg,
        #[arg(long)]
        ascending: bool,
    },
    /// Downloads one loader configuration file.
    Download {
        partner_id: String,
        loader_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Uploads a transformation config template (.xls/.xlsx, up to 5MB).
    UploadConfig { partner_id: String, file: PathBuf },
    /// Uploads up to five loader data spreadsheets, one after another.
    UploadData {
        partner_id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    CreatedAt,
    LoaderId,
    TemplateName,
    LoaderType,
    UploadedBy,
}

impl From<SortArg> for LoaderSortKey {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::CreatedAt => LoaderSortKey::CreatedAt,
            SortArg::LoaderId => LoaderSortKey::LoaderId,
            SortArg::TemplateName => LoaderSortKey::TemplateName,
            SortArg::LoaderType => LoaderSortKey::LoaderType,
            SortArg::UploadedBy => LoaderSortKey::UploadedBy,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings()?;
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    let dashboard = Dashboard::connect(settings).await?;

    match cli.command {
        Command::List { page, size, query } => list(&dashboard, page, size, query).await,
        Command::Edit {
            id,
            name,
            partner_type,
            email,
            contact_number,
            date_of_agreement,
            pan,
        } => {
            let changes = [
                (PartnerField::PartnerName, name),
                (PartnerField::Type, partner_type),
                (PartnerField::Email, email),
                (PartnerField::ContactNumber, contact_number),
                (PartnerField::DateOfAgreement, date_of_agreement),
                (PartnerField::Pan, pan),
            ];
            edit(&dashboard, PartnerId::new(id), changes).await
        }
        Command::Onboard {
            name,
            partner_type,
            email,
            contact_number,
            pan,
            gst,
            address,
            date_of_agreement,
        } => {
            dashboard.open_view(DashboardView::Onboarding).await?;
            let form = dashboard.onboarding();
            for (field, value) in [
                (PartnerField::PartnerName, name),
                (PartnerField::Type, partner_type),
                (PartnerField::Email, email),
                (PartnerField::ContactNumber, contact_number),
                (PartnerField::Pan, pan),
                (PartnerField::Gst, gst),
                (PartnerField::ContactAddress, address),
                (PartnerField::DateOfAgreement, date_of_agreement),
            ] {
                form.set_field(field, value).await;
            }
            match form.submit().await? {
                OnboardingOutcome::Created(partner) => {
                    println!("registered partner id={} name={}", partner.id, partner.partner_name);
                    Ok(())
                }
                OnboardingOutcome::Invalid(errors) => {
                    report_field_errors(&errors);
                    Err(ClientError::Validation(errors)).context("partner was not registered")
                }
                OnboardingOutcome::Rejected(errors) => {
                    report_field_errors(&errors);
                    Err(ClientError::ServerValidation(errors)).context("partner was not registered")
                }
            }
        }
        Command::Configs {
            partner_id,
            search,
            sort,
            ascending,
        } => {
            dashboard.open_view(DashboardView::LoaderConfigs).await?;
            let loaders = dashboard.loader_configs();
            loaders.select_partner(PartnerId::new(partner_id)).await?;
            loaders.set_search_term(search).await;
            let direction = if ascending {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            };
            loaders.set_sort(sort.into(), direction).await;
            let rows = loaders.visible().await;
            if rows.is_empty() {
                println!("no loader configurations");
            }
            for row in rows {
                println!(
                    "{:<16} {:<28} {:<6} {:<16} {}",
                    row.loader_id,
                    row.template_name,
                    row.loader_type,
                    row.uploaded_by,
                    row.created_at.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Command::Download {
            partner_id,
            loader_id,
            out,
        } => {
            let loaders = dashboard.loader_configs();
            loaders.select_partner(PartnerId::new(partner_id)).await?;
            let file = loaders.download(&loader_id).await?;
            let target = out.unwrap_or_else(|| PathBuf::from(&file.file_name));
            tokio::fs::write(&target, &file.bytes)
                .await
                .with_context(|| format!("failed to write {}", target.display()))?;
            println!("saved {} bytes to {}", file.bytes.len(), target.display());
            Ok(())
        }
        Command::UploadConfig { partner_id, file } => {
            dashboard.open_view(DashboardView::LoaderConfigs).await?;
            let loaders = dashboard.loader_configs();
            loaders.select_partner(PartnerId::new(partner_id)).await?;
            loaders.upload_template(candidate_from_path(&file).await?).await?;
            println!(
                "uploaded {}; partner now has {} loader configuration(s)",
                file.display(),
                loaders.snapshot().await.configs.len()
            );
            Ok(())
        }
        Command::UploadData { partner_id, files } => {
            dashboard.open_view(DashboardView::LoaderUpload).await?;
            let uploads = dashboard.uploads();
            let mut batch = Vec::with_capacity(files.len());
            for path in &files {
                batch.push(candidate_from_path(path).await?);
            }
            uploads.add_files(batch).await?;
            uploads.select_partner(Some(PartnerId::new(partner_id))).await;
            let report = uploads.submit().await?;
            for result in &report.results {
                let status = match &result.status {
                    FileUploadStatus::Uploaded => "uploaded".to_string(),
                    FileUploadStatus::Failed(reason) => format!("failed: {reason}"),
                    FileUploadStatus::NotAttempted => "skipped".to_string(),
                };
                println!("{:<40} {status}", result.file_name);
            }
            if !report.is_success() {
                bail!(report.summary());
            }
            println!("{}", report.summary());
            Ok(())
        }
    }
}

async fn list(dashboard: &Dashboard, page: u32, size: Option<u32>, query: Option<String>) -> Result<()> {
    let partners = dashboard.partners();
    if let Some(size) = size {
        partners.set_page_size(size).await?;
    }
    if let Some(query) = query {
        partners.set_search_text(query).await;
        partners.settle_search().await?;
    }
    partners.set_page(page).await?;
    dashboard.app_state().set_active_view(DashboardView::PartnerList).await;

    let snapshot = partners.snapshot().await;
    println!(
        "page {} ({} per page), {} partner(s) total",
        snapshot.query.page, snapshot.query.page_size, snapshot.total_elements
    );
    for partner in snapshot.items {
        println!(
            "{:<26} {:<30} {:<11} {:<28} {:<10} {}",
            partner.id.as_str(),
            partner.partner_name,
            partner.partner_type.as_str(),
            partner.email,
            partner.contact_number,
            partner.pan
        );
    }
    Ok(())
}

async fn edit(
    dashboard: &Dashboard,
    id: PartnerId,
    changes: [(PartnerField, Option<String>); 6],
) -> Result<()> {
    find_partner(dashboard, &id).await?;
    let editor = dashboard.editor();
    editor.open_by_id(&id).await?;
    for (field, value) in changes {
        if let Some(value) = value {
            editor.set_field(field, value).await?;
        }
    }
    match editor.submit().await? {
        SubmitOutcome::Saved(partner) => {
            info!(partner_id = %partner.id, "cli: partner updated");
            println!("saved partner id={} name={}", partner.id, partner.partner_name);
            Ok(())
        }
        SubmitOutcome::Invalid(errors) => {
            report_field_errors(&errors);
            Err(ClientError::Validation(errors)).with_context(|| format!("partner {id} was not saved"))
        }
        SubmitOutcome::Rejected(errors) => {
            report_field_errors(&errors);
            Err(ClientError::ServerValidation(errors))
                .with_context(|| format!("partner {id} was not saved"))
        }
    }
}

/// Pages through the listing until `id` is on the loaded page.
async fn find_partner(dashboard: &Dashboard, id: &PartnerId) -> Result<()> {
    let partners = dashboard.partners();
    partners.set_page_size(100).await?;
    let mut page = 0;
    loop {
        partners.set_page(page).await?;
        let snapshot = partners.snapshot().await;
        if snapshot.items.iter().any(|p| &p.id == id) {
            return Ok(());
        }
        let seen = u64::from(page + 1) * u64::from(snapshot.query.page_size);
        if snapshot.items.is_empty() || seen >= snapshot.total_elements {
            return Err(ClientError::InvalidState(format!("partner {id} not found")).into());
        }
        page += 1;
    }
}

async fn candidate_from_path(path: &Path) -> Result<CandidateFile> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("file name is not valid UTF-8")?
        .to_string();
    let mime_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string();
    Ok(CandidateFile {
        name,
        mime_type,
        size: metadata.len(),
        source: FileSource::Path(path.to_path_buf()),
    })
}

fn report_field_errors(errors: &FieldErrors) {
    for (field, message) in errors.iter() {
        eprintln!("  {field}: {message}");
    }
}
