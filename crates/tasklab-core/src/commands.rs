use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::auth::{Credential, LoginProviders};
use crate::cancel::CancelOutcome;
use crate::cli::{Command, GlobalCli, ListArgs};
use crate::client::TesClient;
use crate::config::{Config, Settings};
use crate::controller::TaskListController;
use crate::criteria::{Criteria, CriteriaStore};
use crate::error::ControllerError;
use crate::render::Renderer;

#[instrument(skip_all)]
pub async fn dispatch(cli: GlobalCli, cfg: &Config, settings: &Settings) -> anyhow::Result<()> {
    let renderer = Renderer::new(settings);
    let providers = LoginProviders::from_config(cfg);
    let command = cli.command.unwrap_or(Command::List(ListArgs::default()));
    debug!(?command, "dispatching command");

    match command {
        Command::Providers => {
            let listed = providers.list();
            if listed.is_empty() {
                println!("{}", ControllerError::NoLoginConfigured);
            }
            for (id, name) in listed {
                println!("{id:<10} {name}");
            }
            Ok(())
        }
        Command::Whoami => {
            let credential = login(&providers, cli.login.as_deref(), cfg)?;
            println!("Logged in with API key: {}", credential.masked());
            Ok(())
        }
        Command::List(args) => {
            let controller = connect(&providers, cli.login.as_deref(), cfg, settings)?;
            load_listing(&controller, &args).await?;
            renderer.print_task_list(&controller)
        }
        Command::Show { uuid, list } => {
            let controller = connect(&providers, cli.login.as_deref(), cfg, settings)?;
            load_listing(&controller, &list).await?;
            let task = controller
                .find_task(&uuid)
                .ok_or_else(|| anyhow!("task {uuid} is not part of the current listing"))?;
            renderer.print_task_info(&task)
        }
        Command::Cancel { uuids } => {
            let controller = connect(&providers, cli.login.as_deref(), cfg, settings)?;
            let outcomes = controller.cancel_ids(&uuids).await;
            report_cancellations(&controller, outcomes)
        }
        Command::CancelPage(args) => {
            let controller = connect(&providers, cli.login.as_deref(), cfg, settings)?;
            load_listing(&controller, &args).await?;
            controller.set_all_selected(true);
            let outcomes = controller.cancel_selected().await;
            if outcomes.is_empty() {
                println!("nothing to cancel");
                return Ok(());
            }
            report_cancellations(&controller, outcomes)
        }
    }
}

fn login(
    providers: &LoginProviders,
    id: Option<&str>,
    cfg: &Config,
) -> anyhow::Result<Credential> {
    providers.login(id, cfg).context("login failed")
}

fn connect(
    providers: &LoginProviders,
    id: Option<&str>,
    cfg: &Config,
    settings: &Settings,
) -> anyhow::Result<TaskListController> {
    let credential = login(providers, id, cfg)?;
    let client = Arc::new(TesClient::new(
        &settings.api_url,
        settings.timeout,
        settings.page_size,
        Some(credential.clone()),
    )?);
    let store = CriteriaStore::new(Criteria::with_order(settings.default_order.clone()));
    info!(api = %settings.api_url, "connected task list");
    Ok(TaskListController::new(
        client.clone(),
        client,
        store,
        credential,
        settings,
    ))
}

/// Replays the listing flags as dashboard gestures: status pick, search
/// commit, sort clicks, then page jump.
async fn load_listing(controller: &TaskListController, args: &ListArgs) -> anyhow::Result<()> {
    if let Some(choice) = args.status {
        controller.select_status(choice);
    }

    if let Some(search) = args.search.as_deref() {
        controller.search_input(search);
        if let Err(err) = controller.search_commit() {
            warn!(error = %err, "search not applied");
        }
    }

    for column in &args.sort {
        controller.toggle_sort(*column);
    }

    if let Some(page) = args.page {
        let current = controller.criteria();
        controller.store().set(Criteria { page, ..current });
    }

    controller
        .refresh()
        .await
        .context("failed to load the task list")
}

fn report_cancellations(
    controller: &TaskListController,
    outcomes: Vec<(String, CancelOutcome)>,
) -> anyhow::Result<()> {
    let mut failed = 0usize;
    for (uuid, outcome) in outcomes {
        if outcome == CancelOutcome::Superseded {
            println!("{uuid}: superseded by a newer request");
            continue;
        }
        match outcome.into_result(&uuid) {
            Ok(()) => println!("{uuid}: cancel requested"),
            Err(err) => {
                failed += 1;
                let banner = controller
                    .banner(&uuid)
                    .map(|banner| banner.message)
                    .unwrap_or_else(|| err.to_string());
                eprintln!("{banner}");
                debug!(error = %err, "cancel failure detail");
            }
        }
    }

    if failed > 0 {
        return Err(anyhow!("{failed} cancel request(s) failed"));
    }
    Ok(())
}
