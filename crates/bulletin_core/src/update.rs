use crate::{
    categorize, download_file_name, select_targets, Effect, Msg, Phase, PlannedDownload, RunState,
};

/// Pure update function: applies a message to the run state and returns the effects to execute.
///
/// Messages that do not fit the current phase are ignored.
pub fn update(mut state: RunState, msg: Msg) -> (RunState, Vec<Effect>) {
    if state.is_finished() {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::Start if state.phase() == Phase::Init => {
            state.set_phase(Phase::EstablishingSession);
            vec![Effect::EstablishSession]
        }
        Msg::SessionEstablished(true) if state.phase() == Phase::EstablishingSession => {
            fetch_next_page(&mut state, "no listing page configured")
        }
        Msg::SessionEstablished(false) if state.phase() == Phase::EstablishingSession => {
            enter_fallback(&mut state, "session could not be established")
        }
        Msg::PageFetched { url, html } if state.phase() == Phase::FetchingPage => match html {
            Some(html) => {
                state.set_phase(Phase::DiscoveringLinks);
                vec![Effect::DiscoverLinks {
                    html,
                    page_url: url,
                }]
            }
            None => fetch_next_page(&mut state, "listing page could not be fetched"),
        },
        Msg::LinksDiscovered(candidates) if state.phase() == Phase::DiscoveringLinks => {
            let categories = &state.settings().categories;
            let categorized = categorize(categories, &candidates);
            let selection = select_targets(&categorized);
            if selection.is_complete() {
                let planned = selection
                    .chosen
                    .iter()
                    .filter_map(|(id, link)| {
                        let category = categories.iter().find(|c| &c.id == id)?;
                        Some(PlannedDownload {
                            category: id.clone(),
                            url: link.url.clone(),
                            file_name: download_file_name(&category.download_basename, &link.url),
                        })
                    })
                    .collect();
                state.plan(planned);
                start_next_download(&mut state)
            } else {
                enter_fallback(&mut state, "target links not found on the listing page")
            }
        }
        Msg::DownloadFinished { category, result } if state.phase() == Phase::Downloading => {
            match result {
                Some(result) => {
                    let path = result.path.clone();
                    state.record_download(&category, Some(result));
                    state.set_phase(Phase::Extracting);
                    vec![Effect::ExtractTables { category, path }]
                }
                None => {
                    state.record_download(&category, None);
                    start_next_download(&mut state)
                }
            }
        }
        Msg::TablesExtracted { tables, .. } if state.phase() == Phase::Extracting => {
            state.record_tables(tables);
            start_next_download(&mut state)
        }
        Msg::Cancelled => {
            state.abandon_pending();
            finish(&mut state)
        }
        _ => Vec::new(),
    };

    (state, effects)
}

fn fetch_next_page(state: &mut RunState, reason: &str) -> Vec<Effect> {
    match state.take_next_page() {
        Some(url) => {
            state.set_phase(Phase::FetchingPage);
            vec![Effect::FetchPage { url }]
        }
        None => enter_fallback(state, reason),
    }
}

/// Substitutes the static link list and resumes at the download step.
fn enter_fallback(state: &mut RunState, reason: &str) -> Vec<Effect> {
    state.mark_fallback(reason);
    let settings = state.settings().clone();
    let mut planned = Vec::new();
    for category in &settings.categories {
        match settings.fallback_urls.iter().find(|(id, _)| id == &category.id) {
            Some((_, url)) => planned.push(PlannedDownload {
                category: category.id.clone(),
                url: url.clone(),
                file_name: download_file_name(&category.download_basename, url),
            }),
            None => state.mark_missing(&category.id),
        }
    }
    state.plan(planned);
    start_next_download(state)
}

fn start_next_download(state: &mut RunState) -> Vec<Effect> {
    match state.pop_download() {
        Some((planned, needs_pause)) => {
            state.set_phase(Phase::Downloading);
            let mut effects = Vec::with_capacity(2);
            if needs_pause {
                effects.push(Effect::CourtesyPause);
            }
            effects.push(Effect::Download(planned));
            effects
        }
        None => finish(state),
    }
}

fn finish(state: &mut RunState) -> Vec<Effect> {
    let report = state.report();
    let mut effects = Vec::with_capacity(2);
    if report.downloaded.is_empty() {
        state.set_phase(Phase::Failed);
    } else {
        state.set_phase(Phase::Done);
        effects.push(Effect::SaveMetadata {
            files: state.downloaded_files(),
        });
    }
    effects.push(Effect::Finish(report));
    effects
}
