use iced::widget::image::Handle;
use iced::widget::scrollable::{Direction, Scrollbar};
use iced::widget::{button, column, container, row, scrollable, text, Column, Image, Row};
use iced::{Alignment, Element, Length, Task, Theme};
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::Arc;
use chrono::Local;

use filter_preview::{ArgbImage, CaptureError, PhotoEditor, PhotoFilter, PreviewConfig};

/// Job id of the large view, rendered at full scale
const DISPLAY_JOB: &str = "display";

const THUMB_WIDTH: Length = Length::Fixed(120.0);
const THUMB_HEIGHT: Length = Length::Fixed(90.0);

/// Main application state
struct FilterStudio {
    /// Render thread and filter state; `None` if the GPU could not start
    editor: Option<PhotoEditor>,
    /// Thumbnail per filter, filled in as preview jobs complete
    previews: Vec<(PhotoFilter, Option<Handle>)>,
    display: Option<Handle>,
    selected: PhotoFilter,
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    OpenImage,
    ImageLoaded(Result<Arc<image::RgbaImage>, String>),
    PreviewReady(PhotoFilter, Result<ArgbImage, CaptureError>),
    DisplayReady(Result<ArgbImage, CaptureError>),
    SelectFilter(PhotoFilter),
    Save,
    Saved(Result<PathBuf, String>),
}

impl FilterStudio {
    fn new() -> (Self, Task<Message>) {
        let config = PreviewConfig::load();
        let previews = PhotoFilter::ALL.iter().map(|&filter| (filter, None)).collect();

        // iced runs `new` inside its tokio runtime, so callbacks land there
        let (editor, status) = match PhotoEditor::builder().config(config).build() {
            Ok(editor) => (Some(editor), "Open an image to start.".to_string()),
            Err(err) => {
                tracing::error!(%err, "failed to start the renderer");
                (None, format!("Renderer unavailable: {err}"))
            }
        };

        (
            FilterStudio {
                editor,
                previews,
                display: None,
                selected: PhotoFilter::None,
                status,
            },
            Task::none(),
        )
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::OpenImage => {
                let file = FileDialog::new()
                    .set_title("Select a Photo")
                    .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp", "tiff"])
                    .pick_file();

                match file {
                    Some(path) => {
                        self.status = format!("Loading {}...", path.display());
                        Task::perform(load_image(path), Message::ImageLoaded)
                    }
                    None => Task::none(),
                }
            }
            Message::ImageLoaded(Err(err)) => {
                self.status = format!("Could not open image: {err}");
                Task::none()
            }
            Message::ImageLoaded(Ok(image)) => {
                let Some(editor) = &self.editor else {
                    return Task::none();
                };
                self.status = format!("{}x{} image loaded.", image.width(), image.height());
                editor.set_source_image(image);

                for (filter, preview) in &mut self.previews {
                    // Drop stale thumbnails of the previous image
                    editor.cancel_filter_preview(filter.label());
                    *preview = None;
                }

                let previews = self.previews.iter().filter_map(|&(filter, _)| {
                    match editor.filter_preview(filter.label(), filter) {
                        Ok(pending) => Some(Task::perform(pending, move |result| {
                            Message::PreviewReady(filter, result)
                        })),
                        Err(err) => {
                            tracing::warn!(filter = filter.label(), %err, "preview rejected");
                            None
                        }
                    }
                });
                let mut tasks: Vec<_> = previews.collect();
                tasks.push(self.refresh_display());
                Task::batch(tasks)
            }
            Message::PreviewReady(filter, result) => {
                match result {
                    Ok(frame) => {
                        if let Some(slot) = self.previews.iter_mut().find(|(f, _)| *f == filter) {
                            slot.1 = Some(to_handle(&frame));
                        }
                    }
                    Err(err) => tracing::debug!(filter = filter.label(), %err, "preview not available"),
                }
                Task::none()
            }
            Message::DisplayReady(result) => {
                match result {
                    Ok(frame) => self.display = Some(to_handle(&frame)),
                    Err(CaptureError::Cancelled) => {}
                    Err(err) => self.status = format!("Render failed: {err}"),
                }
                Task::none()
            }
            Message::SelectFilter(filter) => {
                let Some(editor) = &self.editor else {
                    return Task::none();
                };
                if let Err(err) = editor.set_filter_effect(filter) {
                    self.status = format!("Cannot apply {}: {err}", filter.label());
                    return Task::none();
                }
                self.selected = filter;
                self.refresh_display()
            }
            Message::Save => {
                let Some(editor) = &self.editor else {
                    return Task::none();
                };
                self.status = "Saving...".to_string();
                let frame = editor.save_async();
                Task::perform(
                    async move {
                        let frame = frame.await.map_err(|e| e.to_string())?;
                        save_png(&frame)
                    },
                    Message::Saved,
                )
            }
            Message::Saved(result) => {
                self.status = match result {
                    Ok(path) => format!("Saved {}", path.display()),
                    Err(err) => format!("Save failed: {err}"),
                };
                Task::none()
            }
        }
    }

    /// Re-render the large view with the selected filter at full scale.
    fn refresh_display(&self) -> Task<Message> {
        let Some(editor) = &self.editor else {
            return Task::none();
        };
        editor.cancel_filter_preview(DISPLAY_JOB);
        match editor.controller().render_preview_async(DISPLAY_JOB, self.selected, 1.0) {
            Ok(pending) => Task::perform(pending, Message::DisplayReady),
            Err(err) => {
                tracing::warn!(%err, "display render rejected");
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        let toolbar = row![
            button("Open Image").on_press(Message::OpenImage).padding(10),
            button("Save").on_press(Message::Save).padding(10),
            text(&self.status).size(16),
        ]
        .spacing(20)
        .align_y(Alignment::Center);

        let display: Element<Message> = match &self.display {
            Some(handle) => Image::new(handle.clone()).width(Length::Fill).height(Length::Fill).into(),
            None => text("No image").size(24).into(),
        };

        let strip = self.previews.iter().fold(Row::new().spacing(10), |strip, (filter, preview)| {
            let thumbnail: Element<Message> = match preview {
                Some(handle) => Image::new(handle.clone()).width(THUMB_WIDTH).height(THUMB_HEIGHT).into(),
                None => container(text("..."))
                    .width(THUMB_WIDTH)
                    .height(THUMB_HEIGHT)
                    .center_x(THUMB_WIDTH)
                    .center_y(THUMB_HEIGHT)
                    .into(),
            };
            let label = if *filter == self.selected {
                text(format!("[{}]", filter.label()))
            } else {
                text(filter.label())
            };
            strip.push(
                button(Column::new().push(thumbnail).push(label.size(12)).align_x(Alignment::Center))
                    .on_press(Message::SelectFilter(*filter)),
            )
        });

        let content = column![
            toolbar,
            container(display).width(Length::Fill).height(Length::Fill).center_x(Length::Fill),
            scrollable(strip).direction(Direction::Horizontal(Scrollbar::new())),
        ]
        .spacing(20)
        .padding(20);

        container(content).width(Length::Fill).height(Length::Fill).into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    iced::application("Filter Preview", FilterStudio::update, FilterStudio::view)
        .theme(FilterStudio::theme)
        .centered()
        .run_with(FilterStudio::new)
}

/// Decode an image off the UI thread
async fn load_image(path: PathBuf) -> Result<Arc<image::RgbaImage>, String> {
    let decoded = image::open(&path).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(Arc::new(decoded.to_rgba8()))
}

fn to_handle(frame: &ArgbImage) -> Handle {
    let rgba = frame.to_rgba_image();
    Handle::from_rgba(rgba.width(), rgba.height(), rgba.into_raw())
}

/// Write a captured frame to the pictures directory with a timestamped name
fn save_png(frame: &ArgbImage) -> Result<PathBuf, String> {
    let dir = dirs::picture_dir().unwrap_or_else(|| PathBuf::from("."));
    let name = format!("filter-preview-{}.png", Local::now().format("%Y%m%d-%H%M%S"));
    let path = dir.join(name);
    frame
        .to_rgba_image()
        .save(&path)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "saved frame");
    Ok(path)
}
