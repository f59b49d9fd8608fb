//! Image processing driven by a JSON list of steps.
//!
//! The first step produces an image (or names an existing one), every later
//! step transforms the output of the previous step. Processors are plain
//! services; the workflow calls them one after another and records progress
//! in its `status` state.

use crate::core::{
    decode_input, encode_output, unknown_handler, Context, HandlerDef, Service, ServiceKind,
    SharedWorkflowContext, Target, WorkflowContext,
};
use crate::domain::model::{ProcessorType, WorkflowStatus, WorkflowStep};
use crate::domain::ports::ObjectStore;
use crate::utils::error::{DurableError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const STATUS: &str = "status";

#[derive(Debug, Clone, Copy)]
struct StepProcessor {
    ty: ProcessorType,
    service: &'static str,
    handler: &'static str,
}

fn processor_for(action: &str) -> Option<StepProcessor> {
    let (ty, service, handler) = match action {
        "puppeteer" => (ProcessorType::Source, "PuppeteerService", "run"),
        "rotate" => (ProcessorType::Transformer, "TransformerService", "rotate"),
        "blur" => (ProcessorType::Transformer, "TransformerService", "blur"),
        _ => return None,
    };
    Some(StepProcessor {
        ty,
        service,
        handler,
    })
}

fn invalid_definition(reason: String) -> DurableError {
    DurableError::terminal_with_code(400, format!("Invalid workflow definition: {}", reason))
}

pub fn validate_definition(steps: &[WorkflowStep]) -> Result<()> {
    let first = steps
        .first()
        .ok_or_else(|| invalid_definition("no steps defined".to_string()))?;

    for step in steps {
        if processor_for(&step.action).is_none() {
            return Err(invalid_definition(format!("Service {} not found", step.action)));
        }
        if step.parameters.is_none() {
            return Err(invalid_definition(format!(
                "Step {} must contain parameters",
                step.action
            )));
        }
    }

    let first_is_source = processor_for(&first.action).map(|p| p.ty) == Some(ProcessorType::Source);
    if !first_is_source && first.img_input_path.is_none() {
        return Err(invalid_definition(
            "First step must be a source or contain an image file path".to_string(),
        ));
    }

    for step in &steps[1..] {
        if processor_for(&step.action).map(|p| p.ty) != Some(ProcessorType::Transformer) {
            return Err(invalid_definition(format!(
                "Step {} must be a transformer",
                step.action
            )));
        }
    }

    Ok(())
}

/// 每一步的輸出是 `{dir}/{img_name}-{i}.png`，下一步以它為輸入
pub fn with_image_paths(steps: Vec<WorkflowStep>, dir: &str, img_name: &str) -> Vec<WorkflowStep> {
    let path = |i: usize| format!("{}/{}-{}.png", dir, img_name, i);
    steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| WorkflowStep {
            img_input_path: if i == 0 {
                step.img_input_path
            } else {
                Some(path(i - 1))
            },
            img_output_path: Some(path(i)),
            ..step
        })
        .collect()
}

pub struct ImageProcessingWorkflow {
    output_dir: String,
}

impl ImageProcessingWorkflow {
    pub fn new(output_dir: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub async fn run(&self, ctx: WorkflowContext, steps: Vec<WorkflowStep>) -> Result<WorkflowStatus> {
        validate_definition(&steps)?;

        let img_name = ctx.rand_uuid().to_string();
        let steps = with_image_paths(steps, &self.output_dir, &img_name);

        let mut status = WorkflowStatus {
            status: "Processing".to_string(),
            img_name,
            output: Vec::new(),
        };
        ctx.set(STATUS, &status)?;

        for step in &steps {
            let processor = processor_for(&step.action)
                .ok_or_else(|| invalid_definition(format!("Service {} not found", step.action)))?;
            tracing::info!(step = %step.action, service = processor.service, "Running workflow step");

            let result: String = ctx
                .call(Target::service(processor.service, processor.handler), step)
                .await?;
            status.output.push(result);
            ctx.set(STATUS, &status)?;
        }

        status.status = "Finished".to_string();
        ctx.set(STATUS, &status)?;
        Ok(status)
    }

    pub async fn get_status(&self, ctx: SharedWorkflowContext) -> Result<Option<WorkflowStatus>> {
        ctx.get(STATUS)
    }
}

#[async_trait]
impl Service for ImageProcessingWorkflow {
    fn name(&self) -> &'static str {
        "ImageProcessingWorkflow"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Workflow
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[
            HandlerDef::workflow("run"),
            HandlerDef::shared("getStatus"),
        ];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "run" => encode_output(self.run(ctx.into_workflow()?, decode_input(input)?).await?),
            "getStatus" => encode_output(self.get_status(ctx.into_shared_workflow()?).await?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}

fn required_path<'a>(step: &'a WorkflowStep, path: &'a Option<String>, which: &str) -> Result<&'a str> {
    path.as_deref().ok_or_else(|| {
        DurableError::terminal_with_code(
            400,
            format!("Step {} is missing its {} image path", step.action, which),
        )
    })
}

fn required_number(step: &WorkflowStep, name: &str) -> Result<f64> {
    step.parameter_f64(name).ok_or_else(|| {
        DurableError::terminal_with_code(
            400,
            format!("Step {} requires a numeric '{}' parameter", step.action, name),
        )
    })
}

/// Mock screenshot source: writes a placeholder image for the given url.
pub struct PuppeteerService<S> {
    storage: Arc<S>,
}

impl<S: ObjectStore> PuppeteerService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub async fn run(&self, ctx: &Context, step: WorkflowStep) -> Result<String> {
        let url = step
            .parameter_str("url")
            .ok_or_else(|| {
                DurableError::terminal_with_code(400, "Step puppeteer requires a 'url' parameter")
            })?
            .to_string();
        let output = required_path(&step, &step.img_output_path, "output")?;
        tracing::info!("Taking screenshot of {}", url);

        let storage = &self.storage;
        let placeholder = format!("PNG placeholder: screenshot of {}", url).into_bytes();
        let data = placeholder.as_slice();
        ctx.run("screenshot", move || storage.write_file(output, data))
            .await?;

        Ok(format!("[Took screenshot of website with url: {}]", url))
    }
}

#[async_trait]
impl<S: ObjectStore + 'static> Service for PuppeteerService<S> {
    fn name(&self) -> &'static str {
        "PuppeteerService"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Service
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[HandlerDef::new("run")];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "run" => encode_output(self.run(&ctx, decode_input(input)?).await?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}

/// Mock image transformations. The output is the input image tagged with
/// the applied operation.
pub struct TransformerService<S> {
    storage: Arc<S>,
}

impl<S: ObjectStore> TransformerService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    async fn transform(&self, ctx: &Context, step: &WorkflowStep, operation: String) -> Result<()> {
        let input = required_path(step, &step.img_input_path, "input")?;
        let output = required_path(step, &step.img_output_path, "output")?;
        let storage = &self.storage;
        let operation = operation.as_str();

        ctx.run(operation, move || async move {
            let image = storage.read_file(input).await.map_err(|e| match e {
                DurableError::Terminal { .. } => e,
                other => DurableError::terminal(format!("Error reading image {}: {}", input, other)),
            })?;
            let mut transformed = format!("{}\n", operation).into_bytes();
            transformed.extend_from_slice(&image);
            storage.write_file(output, &transformed).await
        })
        .await
    }

    pub async fn rotate(&self, ctx: &Context, step: WorkflowStep) -> Result<String> {
        let angle = required_number(&step, "angle")?;
        tracing::info!("Rotating image with angle: {}", angle);
        self.transform(ctx, &step, format!("rotate {}", angle)).await?;
        Ok(format!("[Rotated image with angle: {}]", angle))
    }

    pub async fn blur(&self, ctx: &Context, step: WorkflowStep) -> Result<String> {
        let blur = required_number(&step, "blur")?;
        tracing::info!("Blurring image with parameter {}", blur);
        self.transform(ctx, &step, format!("blur {}", blur)).await?;
        Ok(format!("[Blurred image with strength param {}]", blur))
    }
}

#[async_trait]
impl<S: ObjectStore + 'static> Service for TransformerService<S> {
    fn name(&self) -> &'static str {
        "TransformerService"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Service
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[HandlerDef::new("rotate"), HandlerDef::new("blur")];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "rotate" => encode_output(self.rotate(&ctx, decode_input(input)?).await?),
            "blur" => encode_output(self.blur(&ctx, decode_input(input)?).await?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
