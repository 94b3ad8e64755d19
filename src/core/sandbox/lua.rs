use crate::core::sandbox::host::{Arity, HostFn, ScriptHost, ScriptValue};
use crate::models::error::SError;
use camino::Utf8Path;
use mlua::{
    ChunkMode, Error as LuaError, FromLua, IntoLua, Lua, LuaOptions, Result as LuaResult, StdLib,
    Table, Value, Variadic,
};
use std::fs;

impl<'lua> FromLua<'lua> for ScriptValue {
    fn from_lua(value: Value<'lua>, _lua: &'lua Lua) -> LuaResult<Self> {
        Ok(match value {
            Value::Nil => ScriptValue::Nil,
            Value::Boolean(b) => ScriptValue::Bool(b),
            Value::Integer(i) => ScriptValue::Integer(i),
            Value::Number(n) => ScriptValue::Number(n),
            Value::String(s) => ScriptValue::Str(s.to_string_lossy().into_owned()),
            other => {
                return Err(LuaError::FromLuaConversionError {
                    from: other.type_name(),
                    to: "ScriptValue",
                    message: Some("host functions take nil, booleans, numbers or strings".into()),
                })
            }
        })
    }
}

impl<'lua> IntoLua<'lua> for ScriptValue {
    fn into_lua(self, lua: &'lua Lua) -> LuaResult<Value<'lua>> {
        Ok(match self {
            ScriptValue::Nil => Value::Nil,
            ScriptValue::Bool(b) => Value::Boolean(b),
            ScriptValue::Integer(i) => Value::Integer(i),
            ScriptValue::Number(n) => Value::Number(n),
            ScriptValue::Str(s) => Value::String(lua.create_string(&s)?),
        })
    }
}

/// Lua 5.4 with only the pure libraries loaded. No `io`, `os`, `package` or `debug`,
/// so the host's `fs` table is the only way to touch the disk.
pub struct LuaHost {
    lua: Lua,
}

impl LuaHost {
    pub fn new() -> Result<Self, SError> {
        let libs = StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE;
        let lua = Lua::new_with(libs, LuaOptions::default())?;

        // The base library still ships file loaders.
        {
            let globals = lua.globals();
            for name in ["dofile", "loadfile"] {
                globals.set(name, Value::Nil)?;
            }
        }

        Ok(Self { lua })
    }

    fn namespace<'lua>(lua: &'lua Lua, name: &str) -> LuaResult<Table<'lua>> {
        let globals = lua.globals();
        match globals.get::<_, Value>(name)? {
            Value::Table(table) => Ok(table),
            Value::Nil => {
                let table = lua.create_table()?;
                globals.set(name, table.clone())?;
                Ok(table)
            }
            _ => Err(LuaError::external(format!("global {name} is not a table"))),
        }
    }
}

impl ScriptHost for LuaHost {
    fn register_function(&mut self, name: &str, arity: Arity, f: HostFn) -> Result<(), SError> {
        let function = self.lua.create_function(move |_, args: Variadic<ScriptValue>| {
            let args = arity.normalize(args.into_iter().collect());
            f(args).map_err(LuaError::external)
        })?;

        match name.split_once('.') {
            Some((table, field)) => Self::namespace(&self.lua, table)?.set(field, function)?,
            None => self.lua.globals().set(name, function)?,
        }
        Ok(())
    }

    fn eval_file(&mut self, path: &Utf8Path) -> Result<(), SError> {
        let bytes = fs::read(path)?;
        let source = String::from_utf8_lossy(&bytes).into_owned();
        let chunk_name = path.file_name().unwrap_or("script");

        self.lua
            .load(source.as_str())
            .set_name(chunk_name)
            .set_mode(ChunkMode::Text)
            .exec()
            .map_err(|e| SError::Script(e.to_string()))
    }
}
