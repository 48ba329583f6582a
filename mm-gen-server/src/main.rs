use std::io;

use actix_cors::Cors;
use actix_web::error::InternalError;
use actix_web::middleware::Logger;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use mm_gen_core::config;
use mm_gen_core::context::ModelContext;
use mm_gen_core::model::sampling::SamplingError;
use mm_gen_core::model::{Generation, GenerationInput, StopReason};

/// "Please enter some text."
const MISSING_TEXT_MESSAGE: &str = "ကျေးဇူးပြု၍ စာသားတစ်ခု ထည့်ပါ။";
/// "Please enter a starting prompt."
const MISSING_PROMPT_MESSAGE: &str = "ကျေးဇူးပြု၍ စတင်ရန် စာသား ထည့်ပါ။";
/// "The temperature value is not valid."
const INVALID_TEMPERATURE_MESSAGE: &str = "temperature တန်ဖိုး မမှန်ကန်ပါ။";
/// "The maxLength value is too large."
const MAX_LENGTH_TOO_LARGE_MESSAGE: &str = "maxLength တန်ဖိုး ကြီးလွန်းပါသည်။";
/// "The request is not valid JSON."
const INVALID_BODY_MESSAGE: &str = "တောင်းဆိုချက် ပုံစံ မမှန်ကန်ပါ။";
/// "Sorry, an error occurred."
const INTERNAL_ERROR_MESSAGE: &str = "တောင်းပန်ပါတယ်၊ အမှားတစ်ခု ဖြစ်ပွားခဲ့ပါသည်။";
/// "Sorry, I cannot produce an answer right now."
const FALLBACK_REPLY: &str = "တောင်းပန်ပါတယ်၊ ယခု အဖြေ မထုတ်ပေးနိုင်ပါ။";

/// Reply styles of `/chat` with `generateMultiple`, as temperature multipliers.
const CHAT_STYLES: [(&str, f32); 3] = [("focused", 0.7), ("balanced", 1.0), ("creative", 1.3)];
const SINGLE_STYLE: (&str, f32) = ("balanced", 1.0);

/// Read-only state shared by every request.
struct ServerState {
	context: ModelContext,
	/// Default sampling temperature.
	temperature: f32,
	/// Default generation length cap.
	max_length: usize,
	/// Largest `maxLength` a request may ask for.
	max_length_limit: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
	text: Option<String>,
	generate_multiple: Option<bool>,
}

#[derive(Serialize, Debug)]
struct ChatReply {
	text: String,
	confidence: f32,
	#[serde(rename = "type")]
	kind: String,
}

#[derive(Serialize)]
struct ChatResponse {
	responses: Vec<ChatReply>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
	prompt: Option<String>,
	max_length: Option<usize>,
	temperature: Option<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
	generated_text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
	model_loaded: bool,
	vocab_size: usize,
}

#[derive(Serialize)]
struct ErrorBody {
	error: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	details: Option<String>,
}

fn bad_request(message: &str) -> HttpResponse {
	HttpResponse::BadRequest().json(ErrorBody { error: message.to_owned(), details: None })
}

fn internal_error<E: std::fmt::Display>(e: E) -> HttpResponse {
	error!("Request failed: {e}");
	HttpResponse::InternalServerError().json(ErrorBody {
		error: INTERNAL_ERROR_MESSAGE.to_owned(),
		details: Some(e.to_string()),
	})
}

/// Returns the trimmed text if it is present and not blank.
fn non_blank(text: Option<&str>) -> Option<&str> {
	text.map(str::trim).filter(|t| !t.is_empty())
}

/// True when a step failed before anything was generated.
fn produced_nothing(generation: &Generation) -> bool {
	generation.new_tokens == 0 && matches!(generation.stop, StopReason::StepFailed(_))
}

/// Builds a chat reply from the generated continuation only (prompt excluded).
fn chat_reply(state: &ServerState, kind: &str, generation: &Generation) -> ChatReply {
	if generation.new_tokens == 0 {
		return ChatReply { text: FALLBACK_REPLY.to_owned(), confidence: 0.0, kind: kind.to_owned() };
	}
	let continuation = &generation.ids[generation.ids.len() - generation.new_tokens..];
	ChatReply {
		text: state.context.vocabulary().render(continuation),
		confidence: generation.confidence,
		kind: kind.to_owned(),
	}
}

/// HTTP POST endpoint `/chat`
///
/// Continues the user's text. With `generateMultiple`, returns one reply per
/// style (focused, balanced, creative) at different temperatures.
#[post("/chat")]
async fn chat(state: web::Data<ServerState>, body: web::Json<ChatRequest>) -> impl Responder {
	let text = match non_blank(body.text.as_deref()) {
		Some(t) => t.to_owned(),
		None => return bad_request(MISSING_TEXT_MESSAGE),
	};
	let styles: Vec<(&'static str, f32)> = if body.generate_multiple.unwrap_or(false) {
		CHAT_STYLES.to_vec()
	} else {
		vec![SINGLE_STYLE]
	};

	let shared = state.clone();
	let result = web::block(move || {
		let mut rng = rand::rng();
		styles
			.into_iter()
			.map(|(kind, factor)| {
				let input = GenerationInput::new(shared.max_length, shared.temperature * factor)?;
				Ok((kind, shared.context.generate(&text, &input, &mut rng)))
			})
			.collect::<Result<Vec<_>, SamplingError>>()
	})
	.await;

	match result {
		Ok(Ok(generations)) => {
			let responses = generations
				.iter()
				.map(|(kind, generation)| chat_reply(&state, kind, generation))
				.collect();
			HttpResponse::Ok().json(ChatResponse { responses })
		}
		Ok(Err(e)) => internal_error(e),
		Err(e) => internal_error(e),
	}
}

/// HTTP POST endpoint `/generate`
///
/// Returns the prompt followed by the generated tokens.
#[post("/generate")]
async fn generate(state: web::Data<ServerState>, body: web::Json<GenerateRequest>) -> impl Responder {
	let prompt = match non_blank(body.prompt.as_deref()) {
		Some(p) => p.to_owned(),
		None => return bad_request(MISSING_PROMPT_MESSAGE),
	};
	let max_length = body.max_length.unwrap_or(state.max_length);
	if max_length > state.max_length_limit {
		return bad_request(MAX_LENGTH_TOO_LARGE_MESSAGE);
	}
	let input = match GenerationInput::new(max_length, body.temperature.unwrap_or(state.temperature)) {
		Ok(input) => input,
		Err(_) => return bad_request(INVALID_TEMPERATURE_MESSAGE),
	};

	let shared = state.clone();
	let result = web::block(move || shared.context.generate(&prompt, &input, &mut rand::rng())).await;

	match result {
		Ok(generation) if produced_nothing(&generation) => {
			warn!("Generation produced nothing, answering with the fallback reply");
			HttpResponse::Ok().json(GenerateResponse { generated_text: FALLBACK_REPLY.to_owned() })
		}
		Ok(generation) => HttpResponse::Ok().json(GenerateResponse { generated_text: generation.text }),
		Err(e) => internal_error(e),
	}
}

/// HTTP GET endpoint `/health`
#[get("/health")]
async fn health(state: web::Data<ServerState>) -> impl Responder {
	HttpResponse::Ok().json(HealthResponse {
		model_loaded: state.context.model_loaded(),
		vocab_size: state.context.vocab_size(),
	})
}

/// Registers the endpoints and a JSON error handler that answers malformed
/// bodies with a localized 400.
fn routes(cfg: &mut web::ServiceConfig) {
	let json_config = web::JsonConfig::default().error_handler(|err, _req| {
		let response = bad_request(INVALID_BODY_MESSAGE);
		InternalError::from_response(err, response).into()
	});

	cfg.app_data(json_config)
		.service(chat)
		.service(generate)
		.service(health);
}

/// Main entry point for the server.
///
/// Reads the configuration from `MM_GEN_*` variables, loads (or builds) the
/// model context once, then serves it read-only to every worker.
#[actix_web::main]
async fn main() -> io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
	let context = ModelContext::load_or_build(&config).map_err(io::Error::other)?;
	if !context.model_loaded() {
		warn!("Serving an untrained model; run mm-gen-trainer first for meaningful output");
	}
	info!(
		"Vocabulary size {}, listening on {}:{}",
		context.vocab_size(),
		config.host,
		config.port
	);

	let state = web::Data::new(ServerState {
		context,
		temperature: config.temperature,
		max_length: config.max_length,
		max_length_limit: config.max_length_limit,
	});

	HttpServer::new(move || {
		let cors = Cors::default()
			.allow_any_origin()
			.allowed_methods(vec!["GET", "POST"])
			.allow_any_header();

		App::new()
			.app_data(state.clone())
			.wrap(cors)
			.wrap(Logger::default())
			.configure(routes)
	})
		.bind((config.host.as_str(), config.port))?
		.run()
		.await
}
