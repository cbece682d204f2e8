// nexa-chat/crates/nexa-chat/src/repl.rs

//! Line-oriented terminal front end. Each loop iteration renders the current
//! screen, reads one command and hands it to the controller.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info};

use crate::bridge::{is_error_reply, ChatBridge};
use crate::config::Config;
use crate::controller::conversation::CLEAR_PROMPT;
use crate::controller::{
    AppController, CharacterDraft, Conversation, ProfileTab, Screen, DELETE_PROMPT, LOGOUT_PROMPT,
};
use crate::store::{AppStore, Attachment, CharacterView, FileKeyValueStore, PersistentStore, Role};
use crate::utils::TextUtils;

enum Flow {
    Continue,
    Quit,
}

pub struct Repl {
    controller: AppController,
    bridge: Arc<ChatBridge>,
    lines: Lines<BufReader<Stdin>>,
    conversation: Option<Conversation>,
    listing: Vec<String>,
}

pub async fn run(config: Config) -> Result<()> {
    let kv = FileKeyValueStore::open(&config.data_dir)?;
    let store = Arc::new(AppStore::open(PersistentStore::new(Arc::new(kv))));
    let controller = AppController::bootstrap(store);
    let bridge = Arc::new(ChatBridge::from_config(&config));
    info!("Data directory: {}", config.data_dir.display());
    if !config.has_api_key() {
        println!("No API key configured: set GEMINI_API_KEY or characters will not answer.");
    }

    let mut repl = Repl {
        controller,
        bridge,
        lines: BufReader::new(tokio::io::stdin()).lines(),
        conversation: None,
        listing: Vec::new(),
    };
    repl.run().await
}

impl Repl {
    async fn run(&mut self) -> Result<()> {
        println!("Nexa Chat. Type 'help' for commands on any screen.");
        loop {
            let screen = self.controller.screen();
            self.sync_conversation(&screen)?;
            self.render(&screen);

            if matches!(screen, Screen::Create | Screen::Edit(_)) {
                if let Flow::Quit = self.on_form(&screen).await? {
                    break;
                }
                continue;
            }

            let Some(line) = self.read_line("> ").await? else {
                break;
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if let Flow::Quit = self.dispatch(&screen, &line).await? {
                break;
            }
        }
        println!("Bye.");
        Ok(())
    }

    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        use std::io::Write;
        print!("{}", prompt);
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }

    async fn ask_yes_no(&mut self, prompt: &str) -> Result<bool> {
        let answer = self.read_line(&format!("{} [y/N] ", prompt)).await?;
        Ok(matches!(answer.as_deref().map(str::trim), Some("y" | "Y" | "yes")))
    }

    /// Keep exactly one open conversation, matching the chat screen.
    fn sync_conversation(&mut self, screen: &Screen) -> Result<()> {
        match screen {
            Screen::Chat(view) => {
                let current = self.conversation.as_ref().map(|c| c.character().id.clone());
                if current.as_deref() != Some(view.character.id.as_str()) {
                    self.conversation = Some(self.controller.open_conversation(self.bridge.clone())?);
                    debug!("Opened conversation with {}", view.character.name);
                }
            }
            _ => self.conversation = None,
        }
        Ok(())
    }

    fn render(&mut self, screen: &Screen) {
        match screen {
            Screen::Auth { error } => {
                println!("\n== Sign in ==");
                if let Some(error) = error {
                    println!("! {}", error);
                }
                println!("login <email> <password> | register <email> <username> <password> | quit");
            }
            Screen::Home => {
                let feed = self.controller.feed();
                println!(
                    "\n== Home == ({} unread notifications)",
                    self.controller.unread_count()
                );
                if !self.controller.search_query().is_empty() {
                    println!("search: {}", self.controller.search_query());
                }
                self.print_listing(&feed);
            }
            Screen::Chat(view) => {
                println!("\n== {} == {}", view.character.name, view.character.tagline);
                if let Some(conversation) = &self.conversation {
                    for (i, message) in conversation.messages().iter().enumerate() {
                        let who = match message.role {
                            Role::User => "you",
                            Role::Model => view.character.name.as_str(),
                        };
                        let marker = if is_error_reply(&message.text) { " !" } else { "" };
                        let edited = if message.is_edited { " (edited)" } else { "" };
                        println!("[{}] {}{}: {}{}", i + 1, who, marker, message.text, edited);
                    }
                }
            }
            Screen::Create => println!("\n== New character =="),
            Screen::Profile => {
                let user = self.controller.current_user().map(|u| u.username.clone()).unwrap_or_default();
                let stats = self.controller.profile_stats();
                println!(
                    "\n== {} == {} characters, {} likes, tab: {:?}",
                    user, stats.characters, stats.likes, self.controller.profile_tab()
                );
                let mine = self.controller.profile_characters();
                self.print_listing(&mine);
            }
            Screen::Edit(view) => println!("\n== Editing {} ==", view.character.name),
        }
    }

    fn print_listing(&mut self, views: &[CharacterView]) {
        self.listing = views.iter().map(|v| v.character.id.clone()).collect();
        for (i, view) in views.iter().enumerate() {
            let c = &view.character;
            let badge = match (view.is_author, c.is_public) {
                (true, false) => " [private]",
                (true, true) => " [mine]",
                _ => "",
            };
            println!(
                "{:>2}. {}{} - {} ({} chats)",
                i + 1,
                c.name,
                badge,
                TextUtils::truncate_with_ellipsis(&c.tagline, 60),
                c.chat_count
            );
        }
    }

    /// Resolve a 1-based listing index or a raw id.
    fn pick(&self, arg: &str) -> Option<String> {
        match arg.parse::<usize>() {
            Ok(n) if n >= 1 => self.listing.get(n - 1).cloned(),
            _ if !arg.is_empty() => Some(arg.to_string()),
            _ => None,
        }
    }

    async fn dispatch(&mut self, screen: &Screen, line: &str) -> Result<Flow> {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        if command == "quit" || command == "/quit" {
            return Ok(Flow::Quit);
        }

        match screen {
            Screen::Auth { .. } => self.on_auth(command, rest),
            Screen::Home => self.on_home(command, rest).await?,
            Screen::Chat(_) => self.on_chat(line).await?,
            Screen::Create | Screen::Edit(_) => {}
            Screen::Profile => self.on_profile(command, rest).await?,
        }
        Ok(Flow::Continue)
    }

    fn on_auth(&mut self, command: &str, rest: &str) {
        let args: Vec<&str> = rest.split_whitespace().collect();
        let result = match (command, args.as_slice()) {
            ("login", [email, password]) => self.controller.login(email, password),
            ("register", [email, username, password]) => {
                self.controller.register(email, username, password)
            }
            _ => {
                println!("login <email> <password> | register <email> <username> <password> | quit");
                return;
            }
        };
        if let Err(e) = result {
            debug!("Authentication failed: {}", e);
        }
    }

    async fn on_home(&mut self, command: &str, rest: &str) -> Result<()> {
        match command {
            "search" => self.controller.set_search_query(rest),
            "open" => match self.pick(rest) {
                Some(id) => report(self.controller.select_character(&id)),
                None => println!("open <number>"),
            },
            "create" => self.controller.open_create(),
            "profile" => self.controller.open_profile(),
            "notifications" => {
                for n in self.controller.notifications() {
                    let dot = if n.is_read { " " } else { "*" };
                    println!("{} [{}] {} ({}): {}", dot, n.kind.label(), n.title, n.date, n.message);
                }
            }
            "read" => report(self.controller.mark_all_notifications_read()),
            "logout" => self.logout().await?,
            _ => println!(
                "search <text> | open <n> | create | profile | notifications | read | logout | quit"
            ),
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        let yes = self.ask_yes_no(LOGOUT_PROMPT).await?;
        report(self.controller.logout(&|_: &str| yes));
        Ok(())
    }

    async fn on_chat(&mut self, line: &str) -> Result<()> {
        let Some(conversation) = self.conversation.as_ref() else {
            self.controller.back_from_chat();
            return Ok(());
        };

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "/back" => self.controller.back_from_chat(),
            "/regen" => {
                if let Err(e) = conversation.regenerate().await {
                    println!("! {}", e);
                }
            }
            "/edit" => {
                let (index, text) = rest.split_once(' ').unwrap_or((rest, ""));
                let messages = conversation.messages();
                match index.parse::<usize>().ok().and_then(|n| messages.get(n.wrapping_sub(1))) {
                    Some(message) => {
                        if let Err(e) = conversation.edit_message(&message.id, text.trim()) {
                            println!("! {}", e);
                        }
                    }
                    None => println!("/edit <message number> <new text>"),
                }
            }
            "/image" => {
                let (url, text) = rest.split_once(' ').unwrap_or((rest, ""));
                if url.is_empty() {
                    println!("/image <url> [text]");
                } else if let Err(e) = conversation.send(text, Some(Attachment::image(url))).await {
                    println!("! {}", e);
                }
            }
            "/wallpaper" => {
                let url = match rest.trim() {
                    "" | "none" => None,
                    url => Some(url.to_string()),
                };
                if let Err(e) = conversation.set_wallpaper(url) {
                    println!("! {}", e);
                }
            }
            "/clear" => {
                let yes = self.ask_yes_no(CLEAR_PROMPT).await?;
                if let Some(conversation) = self.conversation.as_ref() {
                    if let Err(e) = conversation.clear(&|_: &str| yes).await {
                        println!("! {}", e);
                    }
                }
            }
            "/help" | "help" => {
                println!("<text> | /image <url> [text] | /edit <n> <text> | /regen | /clear | /wallpaper <url|none> | /back | /quit")
            }
            _ => {
                if let Err(e) = conversation.send(line, None).await {
                    println!("! {}", e);
                }
            }
        }
        Ok(())
    }

    async fn on_profile(&mut self, command: &str, rest: &str) -> Result<()> {
        match command {
            "tab" => match rest {
                "public" => self.controller.set_profile_tab(ProfileTab::Public),
                "private" => self.controller.set_profile_tab(ProfileTab::Private),
                _ => println!("tab public|private"),
            },
            "edit" | "delete" | "publish" | "open" => {
                let Some(id) = self.pick(rest) else {
                    println!("{} <number>", command);
                    return Ok(());
                };
                match command {
                    "edit" => report(self.controller.edit_character(&id)),
                    "publish" => report(self.controller.toggle_publish(&id)),
                    "open" => report(self.controller.select_character(&id)),
                    _ => {
                        let yes = self.ask_yes_no(DELETE_PROMPT).await?;
                        report(self.controller.delete_character(&id, &|_: &str| yes));
                    }
                }
            }
            "home" => self.controller.open_home(),
            "create" => self.controller.open_create(),
            "logout" => self.logout().await?,
            _ => println!(
                "tab public|private | open <n> | edit <n> | publish <n> | delete <n> | create | home | logout | quit"
            ),
        }
        Ok(())
    }

    /// Walk the form fields. A blank name on a new character cancels; on an
    /// edit, blank answers keep the current value and visibility is left to
    /// the profile's `publish` command.
    async fn on_form(&mut self, screen: &Screen) -> Result<Flow> {
        let mut draft = match screen {
            Screen::Edit(view) => CharacterDraft::from_character(&view.character),
            _ => CharacterDraft::default(),
        };
        let editing = draft.id.is_some();

        for label in FORM_FIELDS {
            let current = form_field(&mut draft, label).clone();
            let hint = if current.is_empty() {
                String::new()
            } else {
                format!(" [{}]", TextUtils::truncate_with_ellipsis(&current, 40))
            };
            let Some(answer) = self.read_line(&format!("{}{}: ", label, hint)).await? else {
                return Ok(Flow::Quit);
            };
            let answer = answer.trim();
            if answer == "cancel" || (label == "Name" && answer.is_empty() && !editing) {
                self.controller.cancel_form();
                return Ok(Flow::Continue);
            }
            if !answer.is_empty() {
                *form_field(&mut draft, label) = answer.to_string();
            }
        }
        if !editing {
            draft.is_public = self.ask_yes_no("Make it public?").await?;
        }

        if let Err(e) = self.controller.save_character(draft) {
            println!("! {}", e);
            self.controller.cancel_form();
        }
        Ok(Flow::Continue)
    }
}

const FORM_FIELDS: [&str; 5] = ["Name", "Tagline", "Description", "System instruction", "Avatar URL"];

fn form_field<'a>(draft: &'a mut CharacterDraft, label: &str) -> &'a mut String {
    match label {
        "Name" => &mut draft.name,
        "Tagline" => &mut draft.tagline,
        "Description" => &mut draft.description,
        "System instruction" => &mut draft.system_instruction,
        _ => &mut draft.avatar_url,
    }
}

fn report<T, E: std::fmt::Display>(result: std::result::Result<T, E>) {
    if let Err(e) = result {
        println!("! {}", e);
    }
}
