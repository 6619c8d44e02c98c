use dawn_common::LoaderConfig;
use mlua::{Lua, Value};

/// Entry point for `require("dawn_db")` (exported as `luaopen_dawn_db`).
///
/// Configuration comes from `$DAWN_DB_MODULE_PATH` or the nearest `dawn.toml`
/// above the working directory.
#[mlua::lua_module]
fn dawn_db(lua: &Lua) -> mlua::Result<Value> {
    let cwd = std::env::current_dir().map_err(mlua::Error::external)?;
    let config = LoaderConfig::discover(&cwd).map_err(mlua::Error::external)?;
    dawn_runtime::open_module(lua, &config)
}
