//! Shared fixtures for the integration tests: in-memory PDFs and a recording chat model.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docanalyzer::{
    config::{ChainConfig, Config},
    llm::{ChatModel, ChatModelError},
    processing::{AnalysisService, PipelineSettings},
};
use lopdf::{
    Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};

/// Build a PDF with one page per entry, each page drawing its text in Courier.
pub fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(texts.len());
    for text in texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => texts.len() as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

/// Chat model that records prompts and answers every call with the same text.
pub struct RecordingModel {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log").clone()
    }
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn complete(&self, prompt: &str, _config: &ChainConfig) -> Result<String, ChatModelError> {
        self.prompts
            .lock()
            .expect("prompt log")
            .push(prompt.to_string());
        Ok(self.answer.clone())
    }
}

/// Pipeline settings staging uploads into `upload_dir`.
pub fn settings_in(upload_dir: &std::path::Path) -> PipelineSettings {
    PipelineSettings {
        upload_dir: Some(upload_dir.to_path_buf()),
        ..PipelineSettings::from_config(&Config::default())
    }
}

/// Analysis service backed by `model` with local-endpoint defaults.
pub fn service_with(model: Arc<RecordingModel>, upload_dir: &std::path::Path) -> AnalysisService {
    AnalysisService::with_model(
        model,
        Config::default().chain_defaults(),
        settings_in(upload_dir),
    )
}

/// Number of entries left in a staging directory.
pub fn staged_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).expect("read staging dir").count()
}
