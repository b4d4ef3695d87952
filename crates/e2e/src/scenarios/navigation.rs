//! Navigation between the three tabs

use futures::future::BoxFuture;

use todo_common::{contract, Tab};

use super::{ensure, Group, Scenario, ScenarioContext};
use crate::error::E2eResult;
use crate::expect::{expect, expect_url};

pub(super) fn scenarios() -> Vec<Scenario> {
    let g = Group::Navigation;
    vec![
        Scenario::builtin("TC001", "Should navigate to Add Item tab", g, tc001),
        Scenario::builtin("TC002", "Should navigate to To-Do Tasks tab", g, tc002),
        Scenario::builtin("TC003", "Should navigate to Completed tab", g, tc003),
        Scenario::builtin("TC004", "Should load page with correct title", g, tc004),
        Scenario::builtin("TC005", "Navigation tabs should be visible and clickable", g, tc005),
        Scenario::builtin("TC006", "Direct URL navigation should work", g, tc006),
    ]
}

async fn navigate_and_check(ctx: &ScenarioContext, tab: Tab) -> E2eResult<()> {
    let page = &ctx.page;
    page.open(None).await?;
    page.navigate(tab).await?;
    expect_url(page).to_match(&format!("#{}", tab.fragment())).await
}

fn tc001(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(navigate_and_check(ctx, Tab::AddItem))
}

fn tc002(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(navigate_and_check(ctx, Tab::Todo))
}

fn tc003(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(navigate_and_check(ctx, Tab::Completed))
}

fn tc004(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(None).await?;
        let title = page.driver().text_content(&page.heading()).await?;
        let expected = contract::HEADING_TEXT.to_uppercase();
        ensure(
            title.as_deref().is_some_and(|t| t.to_uppercase().contains(&expected)),
            || format!("heading {:?} does not contain {:?}", title, expected),
        )
    })
}

fn tc005(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(None).await?;
        for tab in Tab::all() {
            expect(page, page.nav(tab)).to_be_visible().await?;
            expect(page, page.nav(tab)).to_be_enabled().await?;
        }
        Ok(())
    })
}

fn tc006(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        for tab in Tab::all() {
            page.open(Some(tab)).await?;
            expect_url(page).to_match(&format!("#{}", tab.fragment())).await?;
        }
        Ok(())
    })
}
