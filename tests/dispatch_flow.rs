// 该文件是 Kanjian （看见） 项目的一部分。
// tests/dispatch_flow.rs - 分发流程端到端测试
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use tokio::sync::watch;

use kanjian::command::{CommandRegistry, VisionCommand};
use kanjian::dispatch::{CANCELED, Dispatcher, HELP, MENU_PROMPT, RequestState};
use kanjian::model::{
  CoordSpace, Face, FaceResult, FacialPoints, NsfwScores, PoseResult, Product, ProductResult,
  TagResult, TextBlock,
};
use kanjian::render::Annotator;
use kanjian::task::PollingTask;
use kanjian::transport::{
  CallbackQuery, Chat, ChatAction, ChatId, ChatTransport, InlineKeyboard, Message, MessageId,
  PhotoSize, TransportError, Update, User,
};
use kanjian::vision::{VisionError, VisionService};

const CHAT: ChatId = 100;

#[derive(Debug, Clone, PartialEq)]
enum Sent {
  Text {
    text: String,
    reply_to: Option<MessageId>,
    keyboard: Option<InlineKeyboard>,
  },
  Photo {
    jpeg: Vec<u8>,
    caption: String,
  },
  Edit {
    message: MessageId,
    text: String,
  },
  Delete(MessageId),
  Action(ChatAction),
  Answer(String),
}

/// 记录所有发送动作的内存传输层
#[derive(Default)]
struct MockTransport {
  sent: Mutex<Vec<Sent>>,
  files: Mutex<HashMap<String, Vec<u8>>>,
  updates: Mutex<VecDeque<Vec<Update>>>,
  polled_offsets: Mutex<Vec<i64>>,
  next_id: AtomicI64,
  fail_photos: AtomicBool,
}

impl MockTransport {
  fn with_file(self, file_id: &str, bytes: Vec<u8>) -> Self {
    self.files.lock().insert(file_id.to_string(), bytes);
    self
  }

  fn failing_photos(self) -> Self {
    self.fail_photos.store(true, Ordering::SeqCst);
    self
  }

  fn sent(&self) -> Vec<Sent> {
    self.sent.lock().clone()
  }

  fn texts(&self) -> Vec<String> {
    self
      .sent()
      .into_iter()
      .filter_map(|s| match s {
        Sent::Text { text, .. } => Some(text),
        _ => None,
      })
      .collect()
  }

  fn photos(&self) -> Vec<(Vec<u8>, String)> {
    self
      .sent()
      .into_iter()
      .filter_map(|s| match s {
        Sent::Photo { jpeg, caption } => Some((jpeg, caption)),
        _ => None,
      })
      .collect()
  }

  fn edits(&self) -> Vec<String> {
    self
      .sent()
      .into_iter()
      .filter_map(|s| match s {
        Sent::Edit { text, .. } => Some(text),
        _ => None,
      })
      .collect()
  }

  fn record(&self, sent: Sent) -> MessageId {
    self.sent.lock().push(sent);
    1000 + self.next_id.fetch_add(1, Ordering::SeqCst)
  }
}

#[async_trait]
impl ChatTransport for MockTransport {
  async fn get_updates(&self, offset: i64, _timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
    self.polled_offsets.lock().push(offset);
    let next = self.updates.lock().pop_front();
    match next {
      Some(updates) => Ok(updates),
      None => {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(Vec::new())
      }
    }
  }

  async fn send_text(
    &self,
    _chat: ChatId,
    text: &str,
    reply_to: Option<MessageId>,
    keyboard: Option<InlineKeyboard>,
  ) -> Result<MessageId, TransportError> {
    Ok(self.record(Sent::Text {
      text: text.to_string(),
      reply_to,
      keyboard,
    }))
  }

  async fn send_photo(
    &self,
    _chat: ChatId,
    jpeg: Vec<u8>,
    caption: &str,
  ) -> Result<MessageId, TransportError> {
    if self.fail_photos.load(Ordering::SeqCst) {
      return Err(TransportError::Api("Bad Request: PHOTO_INVALID_DIMENSIONS".into()));
    }
    Ok(self.record(Sent::Photo {
      jpeg,
      caption: caption.to_string(),
    }))
  }

  async fn edit_message_text(
    &self,
    _chat: ChatId,
    message: MessageId,
    text: &str,
  ) -> Result<(), TransportError> {
    self.record(Sent::Edit {
      message,
      text: text.to_string(),
    });
    Ok(())
  }

  async fn delete_message(&self, _chat: ChatId, message: MessageId) -> Result<(), TransportError> {
    self.record(Sent::Delete(message));
    Ok(())
  }

  async fn send_chat_action(&self, _chat: ChatId, action: ChatAction) -> Result<(), TransportError> {
    self.record(Sent::Action(action));
    Ok(())
  }

  async fn answer_callback_query(&self, query_id: &str) -> Result<(), TransportError> {
    self.record(Sent::Answer(query_id.to_string()));
    Ok(())
  }

  async fn file_url(&self, file_id: &str) -> Result<String, TransportError> {
    if self.files.lock().contains_key(file_id) {
      Ok(format!("mock://{file_id}"))
    } else {
      Err(TransportError::Api(format!("no such file '{file_id}'")))
    }
  }

  async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError> {
    let file_id = url.trim_start_matches("mock://");
    self
      .files
      .lock()
      .get(file_id)
      .cloned()
      .ok_or_else(|| TransportError::Api(format!("no such file '{file_id}'")))
  }
}

/// 返回预设结果并记录收到的图片
struct MockVision {
  faces: FaceResult,
  products: Vec<Product>,
  nsfw: NsfwScores,
  crash_on_tags: bool,
  calls: AtomicUsize,
  images: Mutex<Vec<Vec<u8>>>,
}

impl MockVision {
  fn new(faces: Vec<Face>) -> Self {
    Self {
      faces: FaceResult {
        width: 64,
        height: 48,
        faces,
      },
      products: Vec::new(),
      nsfw: NsfwScores {
        normal: 0.951,
        soft: 0.03,
        adult: 0.019,
      },
      crash_on_tags: false,
      calls: AtomicUsize::new(0),
      images: Mutex::new(Vec::new()),
    }
  }

  fn with_products(mut self, products: Vec<Product>) -> Self {
    self.products = products;
    self
  }

  fn crashing_on_tags(mut self) -> Self {
    self.crash_on_tags = true;
    self
  }

  fn called(&self, image: &[u8]) {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.images.lock().push(image.to_vec());
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl VisionService for MockVision {
  async fn detect_faces(&self, image: &[u8], _threshold: f32) -> Result<FaceResult, VisionError> {
    self.called(image);
    Ok(self.faces.clone())
  }

  async fn detect_products(&self, image: &[u8], _threshold: f32) -> Result<ProductResult, VisionError> {
    self.called(image);
    Ok(ProductResult {
      width: 64,
      height: 48,
      objects: self.products.clone(),
    })
  }

  async fn detect_nsfw(&self, image: &[u8]) -> Result<NsfwScores, VisionError> {
    self.called(image);
    Ok(self.nsfw)
  }

  async fn generate_tags(&self, image: &[u8]) -> Result<TagResult, VisionError> {
    self.called(image);
    if self.crash_on_tags {
      panic!("tag model exploded");
    }
    Ok(TagResult::default())
  }

  async fn analyze_poses(&self, image: &[u8]) -> Result<PoseResult, VisionError> {
    self.called(image);
    Ok(PoseResult {
      space: CoordSpace::Pixel,
      poses: Vec::new(),
    })
  }

  async fn extract_texts(&self, image: &[u8]) -> Result<Vec<TextBlock>, VisionError> {
    self.called(image);
    Err(VisionError::Api {
      status: 500,
      message: "ocr unavailable".into(),
    })
  }
}

fn face() -> Face {
  Face {
    x: 0.25,
    y: 0.25,
    w: 0.5,
    h: 0.5,
    points: FacialPoints::default(),
  }
}

fn product(top_left: (f32, f32), bottom_right: (f32, f32), class: &str) -> Product {
  Product {
    x1: top_left.0,
    y1: top_left.1,
    x2: bottom_right.0,
    y2: bottom_right.1,
    class: class.to_string(),
  }
}

fn png(width: u32, height: u32) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, Rgb([200, 200, 200]));
  let mut bytes = Cursor::new(Vec::new());
  image.write_to(&mut bytes, ImageFormat::Png).unwrap();
  bytes.into_inner()
}

fn user() -> User {
  User {
    id: 7,
    first_name: "Ana".into(),
    username: Some("ana_k".into()),
  }
}

fn photo_message(message_id: MessageId, file_id: &str) -> Message {
  Message {
    message_id,
    chat: Chat { id: CHAT },
    from: Some(user()),
    text: None,
    photo: Some(vec![PhotoSize {
      file_id: file_id.to_string(),
      width: 64,
      height: 48,
    }]),
    document: None,
  }
}

fn menu_message(message_id: MessageId) -> Message {
  Message {
    message_id,
    chat: Chat { id: CHAT },
    from: None,
    text: Some(MENU_PROMPT.to_string()),
    photo: None,
    document: None,
  }
}

fn callback(id: &str, menu: MessageId, data: &str) -> CallbackQuery {
  CallbackQuery {
    id: id.to_string(),
    from: user(),
    message: Some(menu_message(menu)),
    data: Some(data.to_string()),
  }
}

fn dispatcher(
  transport: MockTransport,
  vision: MockVision,
) -> (
  Dispatcher<MockTransport, MockVision>,
  Arc<MockTransport>,
  Arc<MockVision>,
) {
  let transport = Arc::new(transport);
  let vision = Arc::new(vision);
  let dispatcher = Dispatcher::new(
    Arc::clone(&transport),
    Arc::clone(&vision),
    CommandRegistry::new().unwrap(),
    Annotator::without_font(),
    4,
  );
  (dispatcher, transport, vision)
}

/// 发送图片后菜单中某个命令按钮的回调数据
fn button_data(sent: &Sent, command: VisionCommand) -> String {
  let Sent::Text {
    keyboard: Some(keyboard),
    ..
  } = sent
  else {
    panic!("not a menu: {:?}", sent);
  };
  keyboard
    .inline_keyboard
    .iter()
    .flatten()
    .find(|b| b.text == command.label())
    .map(|b| b.callback_data.clone())
    .unwrap()
}

#[tokio::test]
async fn image_message_gets_menu_and_other_messages_get_help() {
  let (dispatcher, transport, _) = dispatcher(MockTransport::default(), MockVision::new(vec![]));

  dispatcher.handle_message(&photo_message(1, "file-a")).await.unwrap();
  let mut text = menu_message(2);
  text.text = Some("hello".into());
  dispatcher.handle_message(&text).await.unwrap();

  let sent = transport.sent();
  assert_eq!(sent.len(), 2);
  let Sent::Text {
    text,
    reply_to,
    keyboard: Some(keyboard),
  } = &sent[0]
  else {
    panic!("expected a menu");
  };
  assert_eq!(text, MENU_PROMPT);
  assert_eq!(*reply_to, Some(1));
  let labels: Vec<_> = keyboard
    .inline_keyboard
    .iter()
    .flatten()
    .map(|b| b.text.as_str())
    .collect();
  assert_eq!(
    labels,
    [
      "Detect Faces",
      "Detect Products",
      "Detect NSFW",
      "Tag This Image",
      "Analyze Poses",
      "Extract Texts",
      "Mask Faces",
      "Cancel"
    ]
  );
  assert!(
    keyboard
      .inline_keyboard
      .iter()
      .flatten()
      .all(|b| b.callback_data.len() <= 64)
  );

  assert_eq!(
    sent[1],
    Sent::Text {
      text: HELP.to_string(),
      reply_to: Some(2),
      keyboard: None,
    }
  );
  assert_eq!(dispatcher.files().len(), 1);
}

#[tokio::test]
async fn zero_faces_sends_exactly_one_error() {
  let transport = MockTransport::default().with_file("file-a", png(64, 48));
  let (dispatcher, transport, vision) = dispatcher(transport, MockVision::new(vec![]));

  dispatcher.handle_message(&photo_message(1, "file-a")).await.unwrap();
  let data = button_data(&transport.sent()[0], VisionCommand::DetectFaces);

  let state = dispatcher
    .handle_callback(callback("q1", 50, &data))
    .await
    .settle()
    .await;

  assert_eq!(
    state,
    RequestState::Failed("No face detected on this image.".into())
  );
  assert_eq!(vision.calls(), 1);
  assert!(transport.photos().is_empty());
  let errors: Vec<_> = transport
    .texts()
    .into_iter()
    .filter(|t| t != MENU_PROMPT)
    .collect();
  assert_eq!(errors, ["No face detected on this image."]);
  assert!(transport.sent().contains(&Sent::Delete(50)));
  assert!(transport.sent().contains(&Sent::Answer("q1".into())));
}

#[tokio::test]
async fn cancel_makes_no_remote_call() {
  let (dispatcher, transport, vision) = dispatcher(MockTransport::default(), MockVision::new(vec![face()]));

  dispatcher.handle_message(&photo_message(1, "file-a")).await.unwrap();
  let state = dispatcher
    .handle_callback(callback("q1", 50, "x"))
    .await
    .settle()
    .await;

  assert_eq!(state, RequestState::Done);
  assert_eq!(vision.calls(), 0);
  assert_eq!(transport.edits(), [CANCELED]);
  assert!(transport.photos().is_empty());
  assert_eq!(transport.texts(), [MENU_PROMPT]);
}

#[tokio::test]
async fn keys_from_two_images_resolve_to_their_own_files() {
  let transport = MockTransport::default()
    .with_file("file-a", png(32, 32))
    .with_file("file-b", png(64, 48));
  let (dispatcher, transport, vision) = dispatcher(transport, MockVision::new(vec![face()]));

  dispatcher.handle_message(&photo_message(1, "file-a")).await.unwrap();
  dispatcher.handle_message(&photo_message(2, "file-b")).await.unwrap();
  let sent = transport.sent();
  let first = button_data(&sent[0], VisionCommand::DetectFaces);
  let second = button_data(&sent[1], VisionCommand::DetectFaces);
  assert_ne!(first, second);

  let state = dispatcher
    .handle_callback(callback("q2", 51, &second))
    .await
    .settle()
    .await;

  assert_eq!(state, RequestState::Done);
  assert_eq!(vision.images.lock().as_slice(), [png(64, 48)]);
}

#[tokio::test]
async fn detected_faces_come_back_as_annotated_photo() {
  let original = png(64, 48);
  let transport = MockTransport::default().with_file("file-a", original.clone());
  let (dispatcher, transport, _) = dispatcher(transport, MockVision::new(vec![face()]));

  dispatcher.handle_message(&photo_message(1, "file-a")).await.unwrap();
  let data = button_data(&transport.sent()[0], VisionCommand::DetectFaces);
  let state = dispatcher
    .handle_callback(callback("q1", 50, &data))
    .await
    .settle()
    .await;
  assert_eq!(state, RequestState::Done);

  assert_eq!(
    transport.edits(),
    ["Processing 'Detect Faces' on received image..."]
  );
  let photos = transport.photos();
  assert_eq!(photos.len(), 1);
  let (jpeg, caption) = &photos[0];
  assert_eq!(caption, "Process result of 'Detect Faces'");
  let decoded = image::load_from_memory(jpeg).unwrap();
  assert_eq!((decoded.width(), decoded.height()), (64, 48));

  let sent = transport.sent();
  let typing = sent.iter().position(|s| *s == Sent::Action(ChatAction::Typing));
  let upload = sent
    .iter()
    .position(|s| *s == Sent::Action(ChatAction::UploadPhoto));
  let photo = sent.iter().position(|s| matches!(s, Sent::Photo { .. }));
  assert!(typing < upload && upload < photo);
  assert_eq!(sent.last(), Some(&Sent::Delete(50)));
}

#[tokio::test]
async fn nsfw_scores_come_back_as_text() {
  let transport = MockTransport::default().with_file("file-a", png(16, 16));
  let (dispatcher, transport, _) = dispatcher(transport, MockVision::new(vec![]));

  dispatcher.handle_message(&photo_message(1, "file-a")).await.unwrap();
  let data = button_data(&transport.sent()[0], VisionCommand::DetectNsfw);
  let state = dispatcher
    .handle_callback(callback("q1", 50, &data))
    .await
    .settle()
    .await;

  assert_eq!(state, RequestState::Done);
  assert!(transport.photos().is_empty());
  assert_eq!(
    transport.texts().last().map(String::as_str),
    Some("Process result of 'Detect NSFW':\n\nNormal: 95.10%\nSoft: 3.00%\nAdult: 1.90%")
  );
}

#[tokio::test]
async fn remote_failure_is_reported_with_verb() {
  let transport = MockTransport::default().with_file("file-a", png(16, 16));
  let (dispatcher, transport, _) = dispatcher(transport, MockVision::new(vec![]));

  dispatcher.handle_message(&photo_message(1, "file-a")).await.unwrap();
  let data = button_data(&transport.sent()[0], VisionCommand::ExtractTexts);
  let state = dispatcher
    .handle_callback(callback("q1", 50, &data))
    .await
    .settle()
    .await;

  let expected = "Failed to detect texts: API error (500): ocr unavailable";
  assert_eq!(state, RequestState::Failed(expected.into()));
  assert_eq!(transport.texts().last().map(String::as_str), Some(expected));
}

#[tokio::test]
async fn stale_and_malformed_callbacks_fail_at_the_menu() {
  let (dispatcher, transport, vision) = dispatcher(MockTransport::default(), MockVision::new(vec![face()]));

  let stale = dispatcher
    .handle_callback(callback("q1", 50, "fdzzzz1"))
    .await
    .settle()
    .await;
  let stale_message =
    "Failed to get file. The bot may have been restarted, please send the image again.";
  assert_eq!(stale, RequestState::Failed(stale_message.into()));

  let malformed = dispatcher
    .handle_callback(callback("q2", 51, "f"))
    .await
    .settle()
    .await;
  assert_eq!(malformed, RequestState::Failed("Unprocessable message.".into()));

  assert_eq!(vision.calls(), 0);
  assert_eq!(transport.edits(), [stale_message, "Unprocessable message."]);
  assert!(transport.texts().is_empty());
}

#[tokio::test]
async fn unreachable_file_reports_fetch_failure() {
  let (dispatcher, transport, vision) = dispatcher(MockTransport::default(), MockVision::new(vec![face()]));

  dispatcher.handle_message(&photo_message(1, "gone")).await.unwrap();
  let data = button_data(&transport.sent()[0], VisionCommand::MaskFaces);
  let state = dispatcher
    .handle_callback(callback("q1", 50, &data))
    .await
    .settle()
    .await;

  assert_eq!(
    state,
    RequestState::Failed("Failed to get file from the server.".into())
  );
  assert_eq!(vision.calls(), 0);
}

#[tokio::test]
async fn polling_loop_advances_offset_and_stops_on_signal() {
  let transport = MockTransport::default();
  transport.updates.lock().push_back(vec![
    Update {
      update_id: 41,
      message: Some(photo_message(1, "file-a")),
      callback_query: None,
    },
    Update {
      update_id: 42,
      message: None,
      callback_query: Some(callback("q1", 50, "x")),
    },
  ]);
  let (dispatcher, transport, _) = dispatcher(transport, MockVision::new(vec![]));
  let (stop, shutdown) = watch::channel(false);

  let mut task = PollingTask::new(Duration::from_secs(1));
  let run = async {
    task.run(&dispatcher, shutdown).await;
  };
  let stopper = async {
    while transport.polled_offsets.lock().len() < 2 {
      tokio::time::sleep(Duration::from_millis(1)).await;
    }
    stop.send(true).unwrap();
  };
  tokio::join!(run, stopper);

  assert_eq!(task.offset(), 43);
  assert_eq!(transport.polled_offsets.lock()[..2], [0, 43]);
  assert_eq!(transport.edits(), [CANCELED]);
}

/// 选择命令并等待处理单元结束
async fn run_command(
  dispatcher: &Dispatcher<MockTransport, MockVision>,
  transport: &MockTransport,
  command: VisionCommand,
) -> RequestState {
  dispatcher.handle_message(&photo_message(1, "file-a")).await.unwrap();
  let data = button_data(&transport.sent()[0], command);
  dispatcher
    .handle_callback(callback("q1", 50, &data))
    .await
    .settle()
    .await
}

/// 菜单之外发出的文本
fn replies(transport: &MockTransport) -> Vec<String> {
  transport
    .texts()
    .into_iter()
    .filter(|t| t != MENU_PROMPT)
    .collect()
}

#[tokio::test]
async fn empty_results_have_their_own_messages() {
  for (command, expected) in [
    (VisionCommand::DetectProducts, "No product detected on this image."),
    (VisionCommand::Tag, "Could not tag given image."),
    (VisionCommand::AnalyzePoses, "No pose detected on this image."),
  ] {
    let transport = MockTransport::default().with_file("file-a", png(16, 16));
    let (dispatcher, transport, vision) = dispatcher(transport, MockVision::new(vec![]));

    let state = run_command(&dispatcher, &transport, command).await;

    assert_eq!(state, RequestState::Failed(expected.into()), "{command}");
    assert_eq!(vision.calls(), 1);
    assert_eq!(replies(&transport), [expected]);
    assert!(transport.photos().is_empty());
    assert!(transport.sent().contains(&Sent::Delete(50)));
  }
}

#[tokio::test]
async fn products_come_back_with_class_list_caption() {
  let transport = MockTransport::default().with_file("file-a", png(64, 48));
  let vision = MockVision::new(vec![]).with_products(vec![
    product((0.1, 0.1), (0.4, 0.6), "Bag"),
    product((0.5, 0.2), (0.9, 0.9), "Shoes"),
  ]);
  let (dispatcher, transport, _) = dispatcher(transport, vision);

  let state = run_command(&dispatcher, &transport, VisionCommand::DetectProducts).await;

  assert_eq!(state, RequestState::Done);
  let photos = transport.photos();
  assert_eq!(photos.len(), 1);
  assert_eq!(photos[0].1, "Process result of 'Detect Products':\n\nBag\nShoes");
  assert!(replies(&transport).is_empty());
}

#[tokio::test]
async fn undecodable_image_is_reported_once() {
  let transport = MockTransport::default().with_file("file-a", b"not an image".to_vec());
  let (dispatcher, transport, vision) = dispatcher(transport, MockVision::new(vec![face()]));

  let state = run_command(&dispatcher, &transport, VisionCommand::DetectFaces).await;

  let RequestState::Failed(message) = state else {
    panic!("expected failure, got {state:?}");
  };
  assert!(message.starts_with("Failed to decode image: "), "{message}");
  assert_eq!(vision.calls(), 1);
  assert_eq!(replies(&transport), [message]);
  assert!(transport.photos().is_empty());
}

#[tokio::test]
async fn failed_photo_delivery_is_reported() {
  let transport = MockTransport::default()
    .with_file("file-a", png(64, 48))
    .failing_photos();
  let (dispatcher, transport, _) = dispatcher(transport, MockVision::new(vec![face()]));

  let state = run_command(&dispatcher, &transport, VisionCommand::MaskFaces).await;

  let expected = "Failed to send result: Bad Request: PHOTO_INVALID_DIMENSIONS";
  assert_eq!(state, RequestState::Failed(expected.into()));
  assert_eq!(replies(&transport), [expected]);
  assert!(transport.sent().contains(&Sent::Delete(50)));
}

#[tokio::test]
async fn far_out_of_range_face_still_gets_a_photo() {
  let transport = MockTransport::default().with_file("file-a", png(64, 48));
  let mut huge = face();
  huge.x = 1.0e9;
  let (dispatcher, transport, _) = dispatcher(transport, MockVision::new(vec![huge]));

  let state = run_command(&dispatcher, &transport, VisionCommand::DetectFaces).await;

  assert_eq!(state, RequestState::Done);
  assert_eq!(transport.photos().len(), 1);
  assert!(replies(&transport).is_empty());
  assert_eq!(transport.sent().last(), Some(&Sent::Delete(50)));
}

#[tokio::test]
async fn crashed_processing_still_answers_the_chat() {
  let transport = MockTransport::default().with_file("file-a", png(16, 16));
  let vision = MockVision::new(vec![]).crashing_on_tags();
  let (dispatcher, transport, _) = dispatcher(transport, vision);

  let state = run_command(&dispatcher, &transport, VisionCommand::Tag).await;

  let RequestState::Failed(message) = state else {
    panic!("expected failure, got {state:?}");
  };
  assert!(message.starts_with("Failed to process image: "), "{message}");
  assert_eq!(replies(&transport), [message]);
  assert!(transport.sent().contains(&Sent::Delete(50)));
}
