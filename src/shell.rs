//! # Demo Shell
//!
//! A line-driven driver for the demo storefront: build the canned
//! checkout document, wire the standard services and directives against
//! the configured transport, then read commands from stdin and run the
//! dispatch loop after each one. `help` lists the commands.

use std::rc::Rc;

use chrono::Utc;
use log::{info, warn};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::api::{FixtureTransport, HttpTransport, SharedTransport};
use crate::core::config::{ResolvedConfig, seed_globals};
use crate::core::framework::Shopfront;
use crate::core::navigator::{ATTR_ROLE, ATTR_STEP_ID};
use crate::directives::{self, ATTR_ACTION, ATTR_ITEM, ATTR_TOGGLE};
use crate::dom::{Element, Page};
use crate::services::{self, checkout::ATTR_RELOAD, checkout_flow::CheckoutFlow, dispatch,
    modal::ModalManager};

/// The canned storefront document: two item forms, the three checkout
/// steps, basket containers, and the fixed chrome (wait overlay, error
/// pane, modal root).
pub fn demo_document() -> Page {
    let page = Page::new();
    let root = page.root();

    // Fixed chrome.
    page.append(root, Element::new("div").id("wait-overlay").hidden());
    page.append(root, Element::new("ul").id("error-pane").hidden());
    page.append(root, Element::new("div").id("modal-root").hidden());
    page.append(root, Element::new("button").id("to-top").text("Top").hidden());

    // Item listing with one plain and one parameterized article.
    let listing = page.append(root, Element::new("section").id("listing"));
    for (item_id, name) in [("404", "Desk lamp"), ("405", "Engraved pen")] {
        page.append(
            listing,
            Element::new("form")
                .attr(ATTR_ITEM, item_id)
                .child(Element::new("h3").text(name))
                .child(Element::new("input").class("quantity-input").value("1"))
                .child(
                    Element::new("button")
                        .attr(ATTR_ACTION, "add-to-basket")
                        .text("Add to basket"),
                ),
        );
    }

    // Main content area, replaceable by category views.
    page.append(root, Element::new("main").attr(ATTR_RELOAD, "main-content"));

    // Basket sidebar.
    let sidebar = page.append(root, Element::new("aside").id("basket"));
    page.append(sidebar, Element::new("div").attr(ATTR_RELOAD, "basket-preview"));
    page.append(sidebar, Element::new("div").attr(ATTR_RELOAD, "basket-totals"));
    page.append(
        sidebar,
        Element::new("button")
            .attr(ATTR_TOGGLE, "#coupon-form")
            .text("Coupon?"),
    );
    page.append(
        sidebar,
        Element::new("div")
            .id("coupon-form")
            .hidden()
            .child(Element::new("input").attr("name", "coupon_code"))
            .child(
                Element::new("button")
                    .attr(ATTR_ACTION, "add-coupon")
                    .text("Apply"),
            )
            .child(
                Element::new("button")
                    .attr(ATTR_ACTION, "remove-coupon")
                    .text("Drop coupon"),
            ),
    );

    // Login form.
    page.append(
        root,
        Element::new("form")
            .attr("data-shop-login", "")
            .id("login-form")
            .child(
                Element::new("input")
                    .attr("name", "email")
                    .attr("data-shop-validate", "mail"),
            )
            .child(
                Element::new("input")
                    .attr("name", "password")
                    .attr("data-shop-validate", "text"),
            )
            .child(Element::new("button").attr("type", "submit").text("Log in")),
    );

    // Checkout: step headers, containers, prev/next.
    let checkout = page.append(root, Element::new("section").id("checkout"));
    let nav = page.append(checkout, Element::new("ul").class("checkout-nav"));
    for (id, label) in [
        ("address", "Address"),
        ("payment", "Payment"),
        ("confirm", "Confirm"),
    ] {
        page.append(
            nav,
            Element::new("li")
                .attr(ATTR_ROLE, "navigation")
                .attr(ATTR_STEP_ID, id)
                .text(label),
        );
    }

    let address_step = page.append(
        checkout,
        Element::new("div").attr(ATTR_ROLE, "container").id("step-address"),
    );
    page.append(
        address_step,
        Element::new("form")
            .attr("data-shop-address", "")
            .child(
                Element::new("input")
                    .attr("name", "name")
                    .attr("data-shop-validate", "text"),
            )
            .child(
                Element::new("input")
                    .attr("name", "street")
                    .attr("data-shop-validate", "text"),
            )
            .child(
                Element::new("input")
                    .attr("name", "town")
                    .attr("data-shop-validate", "text"),
            )
            .child(
                Element::new("button")
                    .attr("type", "submit")
                    .text("Save address"),
            ),
    );

    let payment_step = page.append(
        checkout,
        Element::new("div").attr(ATTR_ROLE, "container").id("step-payment"),
    );
    page.append(
        payment_step,
        Element::new("div").attr(ATTR_RELOAD, "payment-methods"),
    );

    let confirm_step = page.append(
        checkout,
        Element::new("div").attr(ATTR_ROLE, "container").id("step-confirm"),
    );
    page.append(
        confirm_step,
        Element::new("form")
            .id("consents")
            .child(
                Element::new("input")
                    .attr("type", "checkbox")
                    .attr("name", "terms")
                    .attr("data-shop-validate", "none"),
            )
            .child(
                Element::new("input")
                    .attr("type", "checkbox")
                    .attr("name", "privacy")
                    .attr("data-shop-validate", "none"),
            )
            .child(
                Element::new("button")
                    .attr(ATTR_ACTION, "place-order")
                    .text("Place order"),
            ),
    );
    page.append(confirm_step, Element::new("p").id("order-result").hidden());

    page.append(checkout, Element::new("button").attr(ATTR_ROLE, "prev").text("Back"));
    page.append(checkout, Element::new("button").attr(ATTR_ROLE, "next").text("Continue"));

    page
}

/// Wire the standard stack onto `page` and run the first bind pass.
pub fn bootstrap(page: Page, transport: SharedTransport) -> Shopfront {
    let shopfront = Shopfront::new(page);
    services::register_all(&shopfront, transport);
    directives::register_defaults(&shopfront);
    shopfront.bind_directives(None);
    shopfront
}

const HELP: &str = "commands:
  click <selector>        click the first match
  set <selector> <value>  set a control's value (fires change)
  submit <selector>       submit the first matching form
  hash <id>               edit the location hash
  viewport <px>           resize the viewport (fires resize)
  dump                    print the document
  help                    this list
  quit                    exit";

/// Run the interactive demo against the configured transport.
pub async fn run(resolved: ResolvedConfig) -> std::io::Result<()> {
    let transport: SharedTransport = match resolved.transport.as_str() {
        "http" => Rc::new(HttpTransport::new(&resolved.base_url)),
        "fixture" => Rc::new(FixtureTransport::new()),
        other => {
            warn!("unknown transport {other:?}, falling back to the fixture");
            Rc::new(FixtureTransport::new())
        }
    };

    let shopfront = bootstrap(demo_document(), transport);
    seed_globals(&resolved, &shopfront);
    info!(
        "shell up, transport {:?} against {}",
        resolved.transport, resolved.base_url
    );

    // Pull the checkout document and the initial containers before the
    // first prompt.
    if let Some(flow) = shopfront.service::<CheckoutFlow>("checkout") {
        if let Err(err) = flow.init().await {
            warn!("initial checkout load failed: {err}");
        }
    }
    shopfront.actions().push(crate::core::action::Action::RefreshPreview);
    shopfront.actions().push(crate::core::action::Action::ReloadContainer {
        name: "payment-methods".to_string(),
    });
    dispatch::run_queue(&shopfront).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"shopfront demo; type 'help' for commands\n").await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let mut output = String::new();
        if !handle_command(&shopfront, line.trim(), &mut output) {
            break;
        }
        dispatch::run_queue(&shopfront).await;
        if let Some(modal) = shopfront.factory::<ModalManager>("modal") {
            modal.poll_timeouts(Utc::now());
        }
        // Modal callbacks may have enqueued follow-ups.
        dispatch::run_queue(&shopfront).await;
        if !output.is_empty() {
            stdout.write_all(output.as_bytes()).await?;
        }
    }
    info!("shell exiting");
    Ok(())
}

/// Apply one command to the page. Returns `false` on `quit`. Selectors
/// may contain spaces; only `set` splits its remainder again, at the
/// first space after a single-token selector.
fn handle_command(shopfront: &Shopfront, line: &str, output: &mut String) -> bool {
    let page = shopfront.page();
    let (verb, remainder) = line.split_once(' ').unwrap_or((line, ""));
    let remainder = remainder.trim();

    match verb {
        "" => {}
        "quit" | "exit" => return false,
        "help" => output.push_str(&format!("{HELP}\n")),
        "click" => match page.select(remainder).into_iter().next() {
            Some(node) => page.trigger(node, "click"),
            None => output.push_str(&format!("no match for {remainder:?}\n")),
        },
        "set" => {
            let (selector, value) = remainder.split_once(' ').unwrap_or((remainder, ""));
            match page.select(selector).into_iter().next() {
                Some(node) => {
                    page.set_value(node, value);
                    page.trigger(node, "change");
                }
                None => output.push_str(&format!("no match for {selector:?}\n")),
            }
        }
        "submit" => match page.select(remainder).into_iter().next() {
            Some(node) => page.trigger(node, "submit"),
            None => output.push_str(&format!("no match for {remainder:?}\n")),
        },
        "hash" => page.set_location_hash(remainder),
        "viewport" => match remainder.parse::<u32>() {
            Ok(width) => {
                page.set_viewport_width(width);
                page.document_trigger("resize", json!({ "width": width }));
            }
            Err(_) => output.push_str("viewport needs a pixel width\n"),
        },
        "dump" => {
            output.push_str(&page.dump(page.root()));
            output.push('\n');
        }
        other => output.push_str(&format!("unknown command {other:?}, try 'help'\n")),
    }
    true
}

// =====================================================================
// Tests
// =====================================================================
