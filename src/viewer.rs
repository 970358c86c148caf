use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use recapfeed::feed::{FeedController, FeedSnapshot, LoadOutcome, LoadTrigger};
use recapfeed::fetcher::{FeedFetcher, FetchError};
use recapfeed::layout::{LoadControl, SECONDARY_POSTS};
use recapfeed::models::{Brand, Publication};

/// Runs the terminal feed browser until the reader quits.
///
/// Blocks the calling thread; loads are spawned onto `runtime` so the
/// screen keeps redrawing while a page is in flight.
pub fn run_browser<F: FeedFetcher + 'static>(
    controller: Arc<FeedController<F>>,
    publication: Publication,
    runtime: Handle,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let revision = controller.revision();
    let snapshot = controller.snapshot();
    let mut list_state = ListState::default();
    if !snapshot.posts.is_empty() {
        list_state.select(Some(0));
    }

    let mut app = BrowserApp {
        controller,
        publication,
        runtime,
        list_state,
        status: Status::Ready,
        results_tx,
        results_rx,
    };

    let res = run_app(&mut terminal, &mut app, revision, snapshot);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

enum Status {
    Ready,
    Loaded(usize),
    EndOfFeed,
    Failed(String),
}

struct BrowserApp<F> {
    controller: Arc<FeedController<F>>,
    publication: Publication,
    runtime: Handle,
    list_state: ListState,
    status: Status,
    results_tx: UnboundedSender<Result<LoadOutcome, FetchError>>,
    results_rx: UnboundedReceiver<Result<LoadOutcome, FetchError>>,
}

impl<F: FeedFetcher + 'static> BrowserApp<F> {
    fn spawn_load(&self, trigger: LoadTrigger) {
        let controller = Arc::clone(&self.controller);
        let results_tx = self.results_tx.clone();
        self.runtime.spawn(async move {
            let result = match trigger {
                LoadTrigger::Explicit => controller.request_load_more().await,
                LoadTrigger::Viewport => controller.notify_viewport_entered().await,
            };
            let _ = results_tx.send(result);
        });
    }

    fn drain_results(&mut self) {
        while let Ok(result) = self.results_rx.try_recv() {
            match result {
                Ok(LoadOutcome::Appended { exhausted: true, .. }) => {
                    self.status = Status::EndOfFeed;
                }
                Ok(LoadOutcome::Appended { added, .. }) => self.status = Status::Loaded(added),
                Ok(LoadOutcome::Ignored(_)) => {}
                Err(err) => self.status = Status::Failed(err.to_string()),
            }
        }
    }

    fn select(&mut self, index: usize, snapshot: &FeedSnapshot) {
        if snapshot.posts.is_empty() {
            return;
        }
        let last = snapshot.posts.len() - 1;
        let index = index.min(last);
        self.list_state.select(Some(index));

        // the last row stands in for the scroll sentinel
        if index == last && LoadControl::for_snapshot(snapshot) == LoadControl::Sentinel {
            self.spawn_load(LoadTrigger::Viewport);
        }
    }
}

fn run_app<F: FeedFetcher + 'static>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut BrowserApp<F>,
    mut revision: u64,
    mut snapshot: FeedSnapshot,
) -> Result<()> {
    loop {
        app.drain_results();
        if let Some((current, fresh)) = app.controller.snapshot_since(revision) {
            revision = current;
            snapshot = fresh;
        }
        terminal.draw(|f| ui(f, app, &snapshot))?;

        // Poll so finished loads show up without a key press
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let selected = app.list_state.selected().unwrap_or(0);
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    return Ok(());
                }
                KeyCode::Char('j') | KeyCode::Down => {
                    app.select(selected + 1, &snapshot);
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    app.select(selected.saturating_sub(1), &snapshot);
                }
                KeyCode::Char('g') | KeyCode::Home => {
                    app.select(0, &snapshot);
                }
                KeyCode::Char('G') | KeyCode::End => {
                    app.select(usize::MAX, &snapshot);
                }
                KeyCode::Char('m') | KeyCode::Enter => {
                    if LoadControl::for_snapshot(&snapshot) == LoadControl::Button {
                        app.spawn_load(LoadTrigger::Explicit);
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui<F>(f: &mut Frame, app: &mut BrowserApp<F>, snapshot: &FeedSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),  // Header
            Constraint::Min(10),    // Feed
            Constraint::Length(3),  // Footer
        ])
        .split(f.size());

    render_header(f, chunks[0], &app.publication);
    if snapshot.posts.is_empty() {
        render_placeholder(f, chunks[1]);
    } else {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);
        render_feed(f, body[0], app, snapshot);
        render_detail(f, body[1], app, snapshot);
    }
    render_footer(f, chunks[2], app, snapshot);
}

fn render_header(f: &mut Frame, area: Rect, publication: &Publication) {
    let header_text = vec![
        Line::from(vec![Span::styled(
            publication.page_title().to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )]),
        Line::from(vec![Span::styled(
            publication.description(),
            Style::default().fg(Color::Yellow),
        )]),
        brand_line(publication),
    ];

    let header = Paragraph::new(header_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title(" Latest Recaps ")
                .title_alignment(Alignment::Center),
        )
        .alignment(Alignment::Left);

    f.render_widget(header, area);
}

fn brand_line(publication: &Publication) -> Line<'_> {
    let dim = Style::default().fg(Color::DarkGray);
    match publication.brand() {
        Brand::Logo { src, alt } => Line::from(vec![
            Span::styled(alt, dim.add_modifier(Modifier::ITALIC)),
            Span::styled(format!("  [logo: {}]", src), dim),
        ]),
        Brand::Title(title) => Line::from(Span::styled(title, dim)),
    }
}

fn render_placeholder(f: &mut Frame, area: Rect) {
    let placeholder = Paragraph::new("Hang tight! We're drafting the first recap..")
        .block(Block::default().borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM))
        .alignment(Alignment::Center);
    f.render_widget(placeholder, area);
}

fn render_feed<F>(f: &mut Frame, area: Rect, app: &mut BrowserApp<F>, snapshot: &FeedSnapshot) {
    let items: Vec<ListItem> = snapshot
        .posts
        .iter()
        .enumerate()
        .map(|(i, post)| {
            let (marker, style) = match i {
                0 => ("★ ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                i if i <= SECONDARY_POSTS => ("• ", Style::default().fg(Color::White)),
                _ => ("  ", Style::default().fg(Color::Gray)),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{}{}", marker, post.title), style),
                Span::styled(
                    format!("  {}", post.published_at.format("%b %d, %Y")),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::LEFT | Borders::BOTTOM)
                .border_style(Style::default().fg(Color::Gray))
                .title(format!(" {} posts ", snapshot.posts.len())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");

    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_detail<F>(f: &mut Frame, area: Rect, app: &BrowserApp<F>, snapshot: &FeedSnapshot) {
    let Some(post) = app
        .list_state
        .selected()
        .and_then(|i| snapshot.posts.get(i))
    else {
        return;
    };

    let text = vec![
        Line::from(Span::styled(
            post.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Published: {}", post.published_at.format("%Y-%m-%d"))),
        Line::from(format!("Link: {}", app.publication.post_url(post))),
        Line::from(format!("Cover: {}", post.cover_image_url())),
        Line::from(""),
        Line::from(post.brief.clone()),
    ];

    let detail = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
                .border_style(Style::default().fg(Color::Gray)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(detail, area);
}

fn render_footer<F>(f: &mut Frame, area: Rect, app: &BrowserApp<F>, snapshot: &FeedSnapshot) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let key = |k: &'static str| Span::styled(k, key_style);

    let mut spans = vec![
        key(" q "),
        Span::raw(" Quit  "),
        key(" j/k "),
        Span::raw(" Move  "),
    ];

    match LoadControl::for_snapshot(snapshot) {
        LoadControl::Button => {
            spans.push(key(" m "));
            spans.push(Span::raw(" Load more recaps  "));
        }
        LoadControl::Sentinel => spans.push(Span::raw("More load as you reach the end  ")),
        LoadControl::None => {}
    }

    let status = if snapshot.is_fetching {
        Span::styled("Loading…", Style::default().fg(Color::Yellow))
    } else {
        match &app.status {
            Status::Ready => Span::raw(""),
            Status::Loaded(added) => Span::raw(format!("Loaded {} more", added)),
            Status::EndOfFeed => Span::styled("End of feed", Style::default().fg(Color::Green)),
            Status::Failed(err) => Span::styled(
                format!("Load failed: {}", err),
                Style::default().fg(Color::Red),
            ),
        }
    };
    spans.push(status);

    let footer = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Center);

    f.render_widget(footer, area);
}
