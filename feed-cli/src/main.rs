use std::fs;
use std::io;
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feed_client::{
    Comment, FeedClient, FeedClientError, FeedPost, FeedSnapshot, Post, PostDraft, Profile,
    ProfilePatch, PublishError,
};
use futures::StreamExt;

const TOKEN_FILE: &str = ".feed_token";
const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

#[derive(Debug, Parser)]
#[command(name = "feed-cli", version, about = "CLI клиент для feed-server")]
struct Cli {
    /// Адрес сервера.
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Регистрация пользователя.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Вход пользователя.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Собственный профиль (требует токен).
    Profile,
    /// Чужой профиль по id.
    Whois {
        #[arg(long)]
        id: i64,
    },
    /// Частичное обновление профиля (требует токен).
    ///
    /// Не указанные флаги не меняют соответствующие поля.
    EditProfile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    /// Публикация поста: текст и/или картинка (требует токен).
    Publish {
        #[arg(long)]
        text: Option<String>,
        /// Путь к картинке (jpg/png/webp/gif).
        #[arg(long)]
        image: Option<String>,
    },
    /// Лента глазами текущего пользователя (требует токен).
    Feed,
    /// Живая лента: печатает снапшоты до Ctrl-C (требует токен).
    Watch,
    /// Получение поста по id.
    Get {
        #[arg(long)]
        id: i64,
    },
    /// Редактирование текста поста (требует токен).
    Edit {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        text: String,
    },
    /// Удаление поста (требует токен).
    Delete {
        #[arg(long)]
        id: i64,
    },
    /// Переключение лайка (требует токен).
    Like {
        #[arg(long)]
        id: i64,
    },
    /// Комментарии поста.
    Comments {
        #[arg(long)]
        id: i64,
    },
    /// Добавление комментария (требует токен).
    Comment {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        text: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Ошибка: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let server = normalize_server(cli.server.unwrap_or_else(|| DEFAULT_SERVER.to_string()));
    let mut client = FeedClient::new(server);

    if let Some(token) = load_token().context("не удалось прочитать .feed_token")? {
        client.set_token(token);
    }

    match cli.command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let auth = client
                .register(&username, &email, &password)
                .await
                .map_err(map_client_error)?;
            persist_token(&client).context("не удалось сохранить токен")?;
            println!("Регистрация успешна");
            println!("token: {}", auth.access_token);
            print_profile(&auth.user);
        }
        Command::Login { username, password } => {
            let auth = client
                .login(&username, &password)
                .await
                .map_err(map_client_error)?;
            persist_token(&client).context("не удалось сохранить токен")?;
            println!("Вход выполнен");
            println!("token: {}", auth.access_token);
            print_profile(&auth.user);
        }
        Command::Profile => {
            let profile = client.me().await.map_err(map_client_error)?;
            print_profile(&profile);
        }
        Command::Whois { id } => {
            let profile = client.get_profile(id).await.map_err(map_client_error)?;
            print_profile(&profile);
        }
        Command::EditProfile {
            username,
            display_name,
            bio,
            avatar_url,
        } => {
            let patch = ProfilePatch {
                username,
                display_name,
                bio,
                avatar_url,
            };
            let profile = client
                .update_profile(&patch)
                .await
                .map_err(map_client_error)?;
            println!("Профиль обновлён");
            print_profile(&profile);
        }
        Command::Publish { text, image } => {
            let mut draft = match text {
                Some(text) => PostDraft::text(text),
                None => PostDraft::new(),
            };
            if let Some(path) = image {
                let bytes =
                    fs::read(&path).with_context(|| format!("не удалось прочитать {path}"))?;
                let content_type = content_type_for(&path)
                    .context("неизвестное расширение картинки, ожидается jpg/png/webp/gif")?;
                draft = draft.with_image(bytes, content_type);
            }

            let created = client.publish(draft).await.map_err(map_publish_error)?;
            println!("Пост опубликован");
            print_feed_post(&created);
        }
        Command::Feed => {
            let snapshot = client.feed().await.map_err(map_client_error)?;
            print_snapshot(&snapshot);
        }
        Command::Watch => {
            let stream = client.watch_feed().await.map_err(map_client_error)?;
            tokio::pin!(stream);

            println!("Подписка на ленту открыта, Ctrl-C для выхода");
            while let Some(snapshot) = stream.next().await {
                let snapshot = snapshot.map_err(map_client_error)?;
                println!("--- снапшот ---");
                print_snapshot(&snapshot);
            }
            println!("Стрим закрыт сервером");
        }
        Command::Get { id } => {
            let post = client.get_post(id).await.map_err(map_client_error)?;
            print_post(&post);
        }
        Command::Edit { id, text } => {
            let post = client
                .update_post(id, &text)
                .await
                .map_err(map_client_error)?;
            println!("Пост обновлён");
            print_post(&post);
        }
        Command::Delete { id } => {
            client.delete_post(id).await.map_err(map_client_error)?;
            println!("Пост удалён: id={id}");
        }
        Command::Like { id } => {
            let outcome = client.toggle_like(id).await.map_err(map_client_error)?;
            if outcome.liked {
                println!("Лайк поставлен (всего: {})", outcome.like_count);
            } else {
                println!("Лайк снят (всего: {})", outcome.like_count);
            }
        }
        Command::Comments { id } => {
            let comments = client.comments(id).await.map_err(map_client_error)?;
            println!("Комментариев: {}", comments.len());
            for comment in &comments {
                print_comment(comment);
            }
        }
        Command::Comment { id, text } => {
            let comment = client
                .add_comment(id, &text)
                .await
                .map_err(map_client_error)?;
            println!("Комментарий добавлен");
            print_comment(&comment);
        }
    }

    Ok(())
}

fn normalize_server(server: String) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server;
    }

    format!("http://{server}")
}

fn content_type_for(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn parse_token_content(raw: &str) -> Option<String> {
    let token = raw.trim().to_string();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn load_token() -> io::Result<Option<String>> {
    if !Path::new(TOKEN_FILE).exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(TOKEN_FILE)?;
    Ok(parse_token_content(&raw))
}

fn persist_token(client: &FeedClient) -> io::Result<()> {
    if let Some(token) = client.get_token() {
        fs::write(TOKEN_FILE, token)?;
    }
    Ok(())
}

fn map_client_error(err: FeedClientError) -> anyhow::Error {
    let message = match err {
        FeedClientError::Unauthorized => {
            "требуется авторизация: выполните `feed-cli login ...` или `feed-cli register ...`"
                .to_string()
        }
        FeedClientError::NotFound => "ресурс не найден".to_string(),
        FeedClientError::InvalidRequest(message) => format!("некорректный запрос: {message}"),
        FeedClientError::Upload(message) => format!("сбой загрузки: {message}"),
        FeedClientError::Stream(message) => format!("повреждённый стрим: {message}"),
        FeedClientError::Http(err) => format!("ошибка HTTP: {err}"),
    };
    anyhow::anyhow!(message)
}

fn map_publish_error(err: PublishError) -> anyhow::Error {
    match err {
        PublishError::EmptyDraft { .. } => {
            anyhow::anyhow!("пустой пост: укажите --text и/или --image")
        }
        // Черновик здесь пересобирается из флагов при повторном запуске,
        // так что возвращённый draft некуда девать.
        PublishError::Upload { source, .. } => {
            anyhow::anyhow!("картинка не загрузилась: {}", map_client_error(source))
        }
        PublishError::Create { source } => map_client_error(source),
    }
}

fn print_profile(profile: &Profile) {
    println!("профиль:");
    println!("  id: {}", profile.id);
    println!("  username: {}", profile.username);
    println!("  email: {}", profile.email);
    if let Some(display_name) = &profile.display_name {
        println!("  display_name: {display_name}");
    }
    if !profile.bio.is_empty() {
        println!("  bio: {}", profile.bio);
    }
    if let Some(avatar_url) = &profile.avatar_url {
        println!("  avatar: {avatar_url}");
    }
    println!(
        "  posts: {}, followers: {}, following: {}",
        profile.posts_count, profile.followers, profile.following
    );
    println!("  created_at: {}", profile.created_at);
}

fn print_post(post: &Post) {
    println!("id: {}", post.id);
    println!("author: {} (id={})", post.author_username, post.author_id);
    if let Some(text) = &post.text {
        println!("text: {text}");
    }
    if let Some(image_url) = &post.image_url {
        println!("image: {image_url}");
    }
    println!("likes: {}", post.like_count);
    println!("created_at: {}", post.created_at);
    if let Some(updated_at) = post.updated_at {
        println!("updated_at: {updated_at}");
    }
}

fn print_feed_post(entry: &FeedPost) {
    print_post(&entry.post);
    println!("liked: {}", if entry.liked_by_viewer { "да" } else { "нет" });
}

fn print_snapshot(snapshot: &FeedSnapshot) {
    println!("Постов: {}", snapshot.posts.len());
    for entry in &snapshot.posts {
        let mark = if entry.liked_by_viewer { "♥" } else { "♡" };
        let title = entry
            .post
            .text
            .as_deref()
            .unwrap_or_else(|| entry.post.image_url.as_deref().unwrap_or(""));
        println!(
            "- [{}] {} {} {} (author: {})",
            entry.post.id, mark, entry.post.like_count, title, entry.post.author_username
        );
    }
}

fn print_comment(comment: &Comment) {
    println!(
        "- [{}] {}: {} ({})",
        comment.id, comment.author_username, comment.text, comment.created_at
    );
}
