//! Page chrome, accessibility and the raw locator contract

use futures::future::BoxFuture;

use todo_common::{contract, ListKind, Tab};

use super::{ensure, Group, Scenario, ScenarioContext};
use crate::config::Viewport;
use crate::error::E2eResult;
use crate::expect::expect;
use crate::locator::{Locator, Selectors};

pub(super) fn scenarios() -> Vec<Scenario> {
    let ui = Group::UiUx;
    let a11y = Group::Accessibility;
    let loc = Group::SpecificLocators;
    vec![
        Scenario::builtin("TC027", "Main heading should display TO DO LIST", ui, tc027),
        Scenario::builtin("TC028", "Add button should be visible", ui, tc028),
        Scenario::builtin("TC029", "Input field should be visible and enabled", ui, tc029),
        Scenario::builtin("TC030", "Items should display as list", ui, tc030),
        Scenario::builtin("TC031", "Checkbox should be clickable", ui, tc031),
        Scenario::builtin("TC032", "Page should be responsive", ui, tc032),
        Scenario::builtin("TC041", "Input should be focusable", a11y, tc041),
        Scenario::builtin("TC042", "Should be able to add item using keyboard", a11y, tc042),
        Scenario::builtin("TC045", "Verify #new-task input exists", loc, tc045),
        Scenario::builtin("TC046", "Verify #add-item > button exists", loc, tc046),
        Scenario::builtin("TC047", "Verify checkbox exists in list", loc, tc047),
        Scenario::builtin("TC048", "Verify completed item span structure", loc, tc048),
        Scenario::builtin("TC049", "Verify delete button has correct class", loc, tc049),
    ]
}

const RESPONSIVE_VIEWPORTS: [Viewport; 4] = [
    Viewport::new(1920, 1080),
    Viewport::new(1024, 768),
    Viewport::new(768, 1024),
    Viewport::new(375, 667),
];

fn tc027(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(None).await?;
        expect(page, page.heading()).to_be_visible().await?;

        let text = page.driver().text_content(&page.heading()).await?.unwrap_or_default();
        let expected = contract::HEADING_TEXT.to_uppercase();
        ensure(text.to_uppercase().contains(&expected), || {
            format!("heading {:?} does not contain {:?}", text, expected)
        })
    })
}

fn tc028(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(Some(Tab::AddItem)).await?;
        expect(page, page.add_button()).to_be_visible().await
    })
}

fn tc029(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(Some(Tab::AddItem)).await?;
        expect(page, page.input()).to_be_visible().await?;
        expect(page, page.input()).to_be_enabled().await
    })
}

fn tc030(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("List Display Test");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;
        page.navigate(Tab::Todo).await?;
        expect(page, page.item(ListKind::Todo, &item)).to_be_visible().await
    })
}

fn tc031(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Checkbox Click Test");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;
        page.navigate(Tab::Todo).await?;

        let checkbox = page.checkbox(&item);
        expect(page, checkbox.clone()).to_be_visible().await?;
        expect(page, checkbox).to_be_enabled().await
    })
}

fn tc032(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        for viewport in RESPONSIVE_VIEWPORTS {
            page.driver().set_viewport(viewport).await?;
            page.open(None).await?;
            expect(page, page.heading()).to_be_visible().await?;
        }
        Ok(())
    })
}

fn tc041(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(Some(Tab::AddItem)).await?;
        page.driver().focus(&page.input()).await?;
        expect(page, page.input()).to_be_focused().await
    })
}

fn tc042(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Keyboard Test");
        page.open(Some(Tab::AddItem)).await?;
        page.fill_input(&item).await?;
        page.submit_with_enter().await?;
        page.navigate(Tab::Todo).await?;

        // Whether Enter submits is page-specific; record it without failing
        let added = page.driver().is_visible(&page.item(ListKind::Todo, &item)).await?;
        ctx.annotate("keyboard-add", format!("Item added with Enter: {}", added));
        Ok(())
    })
}

fn tc045(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(Some(Tab::AddItem)).await?;
        expect(page, Locator::css("#new-task")).to_be_visible().await
    })
}

fn tc046(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(Some(Tab::AddItem)).await?;
        expect(page, Locator::css("#add-item > button")).to_be_visible().await
    })
}

fn tc047(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&ctx.unique("First Item")).await?;
        page.navigate(Tab::Todo).await?;

        let first_checkbox = page
            .rows(ListKind::Todo)
            .first()
            .locator(Selectors::checkbox());
        expect(page, first_checkbox).to_be_visible().await
    })
}

fn tc048(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Span Test");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;
        page.navigate(Tab::Todo).await?;
        page.complete_item(&item).await?;

        page.navigate(Tab::Completed).await?;
        let span = Locator::css("#completed-tasks > li:nth-child(1) > span");
        expect(page, span.clone()).to_be_visible().await?;
        expect(page, span).to_contain_text(item).await
    })
}

fn tc049(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Delete Class Test");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;
        page.navigate(Tab::Todo).await?;

        let button = page.item(ListKind::Todo, &item).locator("button.delete");
        expect(page, button.clone()).to_be_visible().await?;
        expect(page, button).to_have_class("delete").await
    })
}
